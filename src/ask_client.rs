use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::config::ChatConfig;

#[derive(Debug, Error)]
pub enum AskError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response has no string `answer` field")]
    MissingAnswer,

    #[error("invalid endpoint address: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The question-answering collaborator: one question in, one answer out.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, AskError>;
}

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

pub struct AskClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl AskClient {
    pub fn new(config: &ChatConfig) -> Result<Self, AskError> {
        let endpoint = ask_endpoint(&config.api_base_url)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QuestionAnswerer for AskClient {
    async fn ask(&self, question: &str) -> Result<String, AskError> {
        debug!("Sending question to {}: {:?}", self.endpoint, question);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&AskRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ask request failed with status {}: {}", status, body);
            return Err(AskError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        debug!("Received response: {}", body);

        extract_answer(&body)
    }
}

/// Resolve `<base>/ask`, keeping any path prefix the base address carries.
fn ask_endpoint(base: &Url) -> Result<Url, AskError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("ask")?)
}

fn extract_answer(body: &Value) -> Result<String, AskError> {
    body.get("answer")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AskError::MissingAnswer)
}
