//! Contract with the interview backend.
//!
//! The flows only see the [`Backend`] trait; [`HttpBackend`] is the real
//! implementation speaking HTTP to the resume/chatbot service.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::upload::ResumeFile;

/// Successful `POST /resume/upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Optional confirmation text from the server.
    pub message: Option<String>,
}

/// Successful `POST /chatbot/ask`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskReply {
    /// Assistant reply, absent when the server omitted the field.
    pub response: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload the resume as multipart form data (field `file`).
    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadReceipt, BackendError>;

    /// Send the latest user turn. No history is sent.
    async fn ask(&self, message: &str) -> Result<AskReply, BackendError>;

    /// Liveness probe, returns the server's status message.
    async fn ping(&self) -> Result<String, BackendError>;
}
