use rustyline::{Config, Editor, Result};

pub const PROMPT: &str = "> ";

/// Upper bound on remembered input lines for the up-arrow history.
const MAX_HISTORY: usize = 200;

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .max_history_size(MAX_HISTORY)
        .auto_add_history(false)
        .build();
    Editor::with_config(config)
}
