pub mod backend;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod session;
pub mod state;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use backend::{AskReply, Backend, HttpBackend, UploadReceipt};
pub use config::{Config, OverlayMode};
pub use conversation::{ConversationFlow, InputBuffer, OutgoingTurn, TurnTicket};
pub use coordinator::{FlowTarget, Slot, View, ViewCoordinator};
pub use error::{BackendError, ConfigError, FailureKind, TurnRejected, UploadRejected};
pub use session::{BackendStatus, Completion, Session};
pub use state::{greeting_for, ChatMessage, ChatRole, Transcript};
pub use upload::{OutgoingUpload, PickError, ResumeFile, UploadFlow, UploadNotice, UploadState, UploadTicket};
