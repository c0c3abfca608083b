use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{AskReply, Backend, UploadReceipt};
use crate::config::Config;
use crate::error::BackendError;
use crate::upload::ResumeFile;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct AskRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    response: Option<String>,
}

#[derive(Deserialize, Default)]
struct MessageResponse {
    message: Option<String>,
}

#[derive(Deserialize, Default)]
struct UploadResponse {
    message: Option<String>,
    error: Option<String>,
}

/// Error payload. FastAPI validation errors use `detail` instead of `error`.
#[derive(Deserialize, Default)]
struct ErrorResponse {
    error: Option<String>,
    detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn into_message(self) -> Option<String> {
        self.error.or_else(|| match self.detail {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Some(timeout),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, err: reqwest::Error) -> BackendError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => BackendError::Timeout(timeout),
            _ => err.into(),
        }
    }

    async fn rejection(response: Response) -> BackendError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .unwrap_or_default()
            .into_message();
        BackendError::Rejected { status, message }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadReceipt, BackendError> {
        let url = format!("{}/resume/upload", self.base_url);

        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| BackendError::Io {
                path: file.path.clone(),
                source,
            })?;
        let mime = mime_guess::from_path(&file.path).first_or_octet_stream();

        let part = Part::bytes(bytes)
            .file_name(file.file_name.clone())
            .mime_str(mime.essence_str())
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::debug!(%url, file = %file.file_name, "uploading resume");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        // No field of the success body is required, but an `error` in it is a rejection.
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let body: UploadResponse = serde_json::from_str(&text).unwrap_or_default();
        if let Some(error) = body.error.filter(|e| !e.trim().is_empty()) {
            return Err(BackendError::Rejected {
                status,
                message: Some(error),
            });
        }
        Ok(UploadReceipt {
            message: body.message,
        })
    }

    async fn ask(&self, message: &str) -> Result<AskReply, BackendError> {
        let url = format!("{}/chatbot/ask", self.base_url);

        tracing::debug!(%url, chars = message.chars().count(), "asking assistant");

        let response = self
            .client
            .post(&url)
            .json(&AskRequest { message })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let body: AskResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(AskReply {
            response: body.response,
        })
    }

    async fn ping(&self) -> Result<String, BackendError> {
        let url = format!("{}/", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let body: MessageResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(body.message.unwrap_or_else(|| "online".to_string()))
    }
}
