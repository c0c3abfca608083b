//! Scripted in-memory backend for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{AskReply, Backend, UploadReceipt};
use crate::error::BackendError;
use crate::upload::ResumeFile;

enum Step<T> {
    Reply(Result<T, BackendError>),
    Hang,
}

/// Answers queued replies in order. With an empty queue, asks are echoed and
/// uploads succeed.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    asks: Mutex<VecDeque<Step<AskReply>>>,
    uploads: Mutex<VecDeque<Step<UploadReceipt>>>,
    asked: Mutex<Vec<String>>,
    hang_messages: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ask(&self, outcome: Result<AskReply, BackendError>) {
        self.asks.lock().unwrap().push_back(Step::Reply(outcome));
    }

    /// The next ask never resolves.
    pub(crate) fn hang_next_ask(&self) {
        self.asks.lock().unwrap().push_back(Step::Hang);
    }

    /// Asks carrying exactly `message` never resolve.
    pub(crate) fn hang_on(&self, message: &str) {
        self.hang_messages.lock().unwrap().push(message.to_string());
    }

    pub(crate) fn push_upload(&self, outcome: Result<UploadReceipt, BackendError>) {
        self.uploads.lock().unwrap().push_back(Step::Reply(outcome));
    }

    pub(crate) fn hang_next_upload(&self) {
        self.uploads.lock().unwrap().push_back(Step::Hang);
    }

    pub(crate) fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub(crate) fn ask_calls(&self) -> usize {
        self.asked.lock().unwrap().len()
    }

    pub(crate) fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    pub(crate) fn upload_calls(&self) -> usize {
        self.uploaded.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn upload_resume(&self, file: &ResumeFile) -> Result<UploadReceipt, BackendError> {
        self.uploaded.lock().unwrap().push(file.file_name.clone());
        let step = self.uploads.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(outcome)) => outcome,
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(UploadReceipt::default()),
        }
    }

    async fn ask(&self, message: &str) -> Result<AskReply, BackendError> {
        self.asked.lock().unwrap().push(message.to_string());
        let hangs = self.hang_messages.lock().unwrap().iter().any(|m| m == message);
        if hangs {
            return std::future::pending().await;
        }
        let step = self.asks.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(outcome)) => outcome,
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(AskReply {
                response: Some(format!("echo: {}", message)),
            }),
        }
    }

    async fn ping(&self) -> Result<String, BackendError> {
        Ok("Backend is live".to_string())
    }
}
