//! Progressive "typing" disclosure of a reply.
//!
//! A reveal walks a fixed string one character per tick. Each step is
//! published twice: into the shared [`Reveal`] handle, which the
//! conversation reads to answer "what is visible right now", and into a
//! [`RevealStream`] that a renderer can consume prefix by prefix.
//!
//! Emission and cancellation take the same lock, so once
//! [`Reveal::cancel`] returns no further prefix is produced or observable.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shortest tick the timer accepts; tokio panics on a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct Progress {
    text: String,
    /// Byte offset just past each character of `text`.
    ends: Vec<usize>,
    revealed: usize,
}

impl Progress {
    fn new(text: &str) -> Self {
        let ends = text
            .char_indices()
            .map(|(start, ch)| start + ch.len_utf8())
            .collect();
        Self {
            text: text.to_string(),
            ends,
            revealed: 0,
        }
    }

    fn total(&self) -> usize {
        self.ends.len()
    }

    fn is_finished(&self) -> bool {
        self.revealed >= self.total()
    }

    fn prefix(&self) -> &str {
        match self.revealed {
            0 => "",
            n => &self.text[..self.ends[n - 1]],
        }
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one running (or finished) reveal.
pub struct Reveal {
    progress: Arc<Mutex<Progress>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Reveal {
    /// Number of characters currently visible.
    #[cfg(test)]
    pub fn revealed(&self) -> usize {
        lock(&self.progress).revealed
    }

    pub fn prefix(&self) -> String {
        lock(&self.progress).prefix().to_string()
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.progress).is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The timer task is gone, whether it ran to the end or died.
    fn task_exited(&self) -> bool {
        self.task.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Stop the reveal where it is. Idempotent.
    pub fn cancel(&self) {
        let _progress = lock(&self.progress);
        self.cancel.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Prefixes of a single reveal, in strictly increasing length.
///
/// Ends when the text is fully shown or the reveal is cancelled.
pub struct RevealStream {
    rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl Stream for RevealStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Owns at most one live [`Reveal`]; starting a new one cancels the old.
#[derive(Default)]
pub struct RevealEngine {
    current: Option<Reveal>,
}

impl RevealEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing `text`, one character per `interval`.
    ///
    /// Must be called from within a tokio runtime unless `text` is empty.
    pub fn start(&mut self, text: &str, interval: Duration) -> RevealStream {
        self.cancel();

        let progress = Arc::new(Mutex::new(Progress::new(text)));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = if text.is_empty() {
            None
        } else {
            debug!("Starting reveal of {} chars", text.chars().count());
            Some(tokio::spawn(drive(
                Arc::clone(&progress),
                cancel.clone(),
                tx,
                interval.max(MIN_INTERVAL),
            )))
        };

        self.current = Some(Reveal {
            progress,
            cancel: cancel.clone(),
            task,
        });

        RevealStream { rx, cancel }
    }

    pub fn current(&self) -> Option<&Reveal> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|reveal| {
                !reveal.is_cancelled() && !reveal.is_finished() && !reveal.task_exited()
            })
    }

    /// Cancel and forget the current reveal, if any.
    pub fn cancel(&mut self) {
        if let Some(reveal) = self.current.take() {
            reveal.cancel();
        }
    }
}

async fn drive(
    progress: Arc<Mutex<Progress>>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<String>,
    interval: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let finished = {
            let mut state = lock(&progress);
            if cancel.is_cancelled() {
                break;
            }
            state.revealed += 1;
            // Receiver may be gone; the handle still tracks progress.
            let _ = tx.send(state.prefix().to_string());
            state.is_finished()
        };
        if finished {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    const TICK: Duration = Duration::from_millis(40);

    #[tokio::test(start_paused = true)]
    async fn test_emits_every_prefix_in_order() {
        let mut engine = RevealEngine::new();
        let stream = engine.start("hello", TICK);

        let prefixes: Vec<String> = stream.collect().await;
        assert_eq!(prefixes, vec!["h", "he", "hel", "hell", "hello"]);

        let reveal = engine.current().unwrap();
        assert!(reveal.is_finished());
        assert_eq!(reveal.prefix(), "hello");
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_characters_not_bytes() {
        let mut engine = RevealEngine::new();
        let prefixes: Vec<String> = engine.start("né✓", TICK).collect().await;
        assert_eq!(prefixes, vec!["n", "né", "né✓"]);
    }

    #[tokio::test]
    async fn test_empty_text_finishes_immediately() {
        let mut engine = RevealEngine::new();
        let mut stream = engine.start("", TICK);

        assert!(stream.next().await.is_none());
        assert!(engine.current().unwrap().is_finished());
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_character_per_tick() {
        let mut engine = RevealEngine::new();
        let _stream = engine.start("abcdef", TICK);
        assert_eq!(engine.current().unwrap().revealed(), 0);

        time::sleep(TICK * 2 + Duration::from_millis(5)).await;
        assert_eq!(engine.current().unwrap().revealed(), 2);
        assert_eq!(engine.current().unwrap().prefix(), "ab");
        assert!(engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_reveals_to_the_end() {
        let mut engine = RevealEngine::new();
        let prefixes: Vec<String> = engine.start("abc", Duration::ZERO).collect().await;

        assert_eq!(prefixes, vec!["a", "ab", "abc"]);
        assert!(engine.current().unwrap().is_finished());
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reveal_emits_nothing_more() {
        let mut engine = RevealEngine::new();
        let mut stream = engine.start("abcdef", TICK);

        assert_eq!(stream.next().await.as_deref(), Some("a"));
        engine.current().unwrap().cancel();

        time::sleep(TICK * 10).await;
        assert!(stream.next().await.is_none());
        assert_eq!(engine.current().unwrap().revealed(), 1);
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replays_from_the_beginning() {
        let mut engine = RevealEngine::new();
        let mut first = engine.start("abc", TICK);
        assert_eq!(first.next().await.as_deref(), Some("a"));
        assert_eq!(first.next().await.as_deref(), Some("ab"));

        let second = engine.start("abc", TICK);
        assert_eq!(engine.current().unwrap().revealed(), 0);
        assert!(first.next().await.is_none());

        let replay: Vec<String> = second.collect().await;
        assert_eq!(replay, vec!["a", "ab", "abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_stream_never_interleaves() {
        let mut engine = RevealEngine::new();
        let mut old = engine.start("old reply", TICK);
        time::sleep(TICK * 3 + Duration::from_millis(1)).await;

        let new = engine.start("new", TICK);
        let fresh: Vec<String> = new.collect().await;
        assert_eq!(fresh, vec!["n", "ne", "new"]);
        assert!(old.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_engine_cancels_reveal() {
        let mut engine = RevealEngine::new();
        let mut stream = engine.start("abcdef", TICK);
        drop(engine);

        time::sleep(TICK * 10).await;
        assert!(stream.next().await.is_none());
    }
}
