//! Resume upload lifecycle.
//!
//! `NoFileSelected -> FileSelected -> Submitting -> {Succeeded, Failed}`, with
//! both terminal states accepting a new selection. The selected file is handed
//! to the request when submission starts and is not kept afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{Backend, UploadReceipt};
use crate::error::{
    BackendError, UploadRejected, NO_FILE_SELECTED_TEXT, UPLOAD_SUCCESS_TEXT,
};

/// A local file chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// Why the file picker refused a path.
#[derive(Debug, thiserror::Error)]
pub enum PickError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),
    #[error("only {allowed} files can be uploaded")]
    Extension { allowed: String },
}

impl ResumeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, file_name }
    }

    /// Picker-side check: the path must be an existing regular file with one of
    /// `extensions` (case-insensitive). An empty list accepts anything.
    pub fn pick(path: &Path, extensions: &[String]) -> Result<Self, PickError> {
        let metadata = fs::metadata(path).map_err(|_| PickError::NotFound(path.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(PickError::NotAFile(path.to_path_buf()));
        }

        if !extensions.is_empty() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !extensions.iter().any(|allowed| *allowed == ext) {
                let allowed = extensions
                    .iter()
                    .map(|e| format!(".{}", e))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(PickError::Extension { allowed });
            }
        }

        Ok(Self::new(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    NoFileSelected,
    FileSelected(ResumeFile),
    Submitting,
    Succeeded,
    Failed(String),
}

/// Text shown under the upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadNotice {
    Validation(String),
    Success(String),
    Failure(String),
}

impl UploadNotice {
    pub fn text(&self) -> String {
        match self {
            UploadNotice::Validation(text) | UploadNotice::Success(text) => text.clone(),
            UploadNotice::Failure(reason) => format!("Upload failed: {}", reason),
        }
    }
}

/// Identifies the submission a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u64);

/// Request produced by [`UploadFlow::begin_submit`], to be sent by the caller.
#[derive(Debug, Clone)]
pub struct OutgoingUpload {
    pub ticket: UploadTicket,
    pub file: ResumeFile,
}

#[derive(Debug)]
pub struct UploadFlow {
    state: UploadState,
    notice: Option<UploadNotice>,
    in_flight: Option<UploadTicket>,
    next_ticket: u64,
}

impl Default for UploadFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlow {
    pub fn new() -> Self {
        Self {
            state: UploadState::NoFileSelected,
            notice: None,
            in_flight: None,
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn notice(&self) -> Option<&UploadNotice> {
        self.notice.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.state == UploadState::Submitting
    }

    pub fn selected_file(&self) -> Option<&ResumeFile> {
        match &self.state {
            UploadState::FileSelected(file) => Some(file),
            _ => None,
        }
    }

    /// Choose a file. The outcome of an earlier submission stays on screen
    /// until the next submission completes.
    pub fn select_file(&mut self, file: ResumeFile) -> Result<(), UploadRejected> {
        if self.is_submitting() {
            return Err(UploadRejected::InFlight);
        }
        if matches!(self.notice, Some(UploadNotice::Validation(_))) {
            self.notice = None;
        }
        tracing::debug!(file = %file.file_name, "resume selected");
        self.state = UploadState::FileSelected(file);
        Ok(())
    }

    /// Start a submission. Without a selected file this only shows the
    /// "no file selected" notice; while submitting it does nothing.
    pub fn begin_submit(&mut self) -> Result<OutgoingUpload, UploadRejected> {
        match std::mem::replace(&mut self.state, UploadState::Submitting) {
            UploadState::FileSelected(file) => {
                let ticket = UploadTicket(self.next_ticket);
                self.next_ticket += 1;
                self.in_flight = Some(ticket);
                Ok(OutgoingUpload { ticket, file })
            }
            UploadState::Submitting => Err(UploadRejected::InFlight),
            other => {
                self.state = other;
                self.notice = Some(UploadNotice::Validation(NO_FILE_SELECTED_TEXT.to_string()));
                Err(UploadRejected::NoFileSelected)
            }
        }
    }

    /// Apply the outcome of the submission identified by `ticket`.
    ///
    /// Returns false, leaving state untouched, when the ticket is not the one
    /// in flight.
    pub fn complete_submit(
        &mut self,
        ticket: UploadTicket,
        outcome: Result<UploadReceipt, BackendError>,
    ) -> bool {
        if self.in_flight != Some(ticket) {
            tracing::debug!(?ticket, "discarding stale upload completion");
            return false;
        }
        self.in_flight = None;

        match outcome {
            Ok(receipt) => {
                tracing::info!(message = ?receipt.message, "resume accepted");
                self.state = UploadState::Succeeded;
                self.notice = Some(UploadNotice::Success(UPLOAD_SUCCESS_TEXT.to_string()));
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = ?err.kind(), "resume upload failed");
                let reason = err.upload_reason();
                self.state = UploadState::Failed(reason.clone());
                self.notice = Some(UploadNotice::Failure(reason));
            }
        }
        true
    }

    /// Run a whole submission against `backend`.
    pub async fn submit(&mut self, backend: &dyn Backend) -> Result<(), UploadRejected> {
        let outgoing = self.begin_submit()?;
        let outcome = backend.upload_resume(&outgoing.file).await;
        self.complete_submit(outgoing.ticket, outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SERVER_UNREACHABLE_TEXT, UNKNOWN_ERROR_TEXT};
    use crate::testing::ScriptedBackend;

    fn resume() -> ResumeFile {
        ResumeFile::new("/tmp/resume.pdf")
    }

    #[tokio::test]
    async fn test_submit_without_file_makes_no_request() {
        let backend = ScriptedBackend::new();
        let mut flow = UploadFlow::new();

        assert_eq!(flow.submit(&backend).await, Err(UploadRejected::NoFileSelected));
        assert_eq!(flow.state(), &UploadState::NoFileSelected);
        assert_eq!(
            flow.notice(),
            Some(&UploadNotice::Validation(NO_FILE_SELECTED_TEXT.to_string()))
        );
        assert_eq!(backend.upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_upload() {
        let backend = ScriptedBackend::new();
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();

        flow.submit(&backend).await.unwrap();

        assert_eq!(flow.state(), &UploadState::Succeeded);
        assert_eq!(
            flow.notice(),
            Some(&UploadNotice::Success(UPLOAD_SUCCESS_TEXT.to_string()))
        );
        assert_eq!(backend.uploaded(), vec!["resume.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_rejection_keeps_server_text() {
        let backend = ScriptedBackend::new();
        backend.push_upload(Err(BackendError::Rejected {
            status: 500,
            message: Some("corrupt PDF".to_string()),
        }));
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();

        flow.submit(&backend).await.unwrap();

        assert_eq!(flow.state(), &UploadState::Failed("corrupt PDF".to_string()));
        assert_eq!(
            flow.notice().map(UploadNotice::text).as_deref(),
            Some("Upload failed: corrupt PDF")
        );
    }

    #[tokio::test]
    async fn test_rejection_without_text_and_transport_failure_differ() {
        let backend = ScriptedBackend::new();
        backend.push_upload(Err(BackendError::Rejected { status: 400, message: None }));
        backend.push_upload(Err(BackendError::Transport("connection refused".to_string())));
        let mut flow = UploadFlow::new();

        flow.select_file(resume()).unwrap();
        flow.submit(&backend).await.unwrap();
        assert_eq!(flow.state(), &UploadState::Failed(UNKNOWN_ERROR_TEXT.to_string()));

        flow.select_file(resume()).unwrap();
        flow.submit(&backend).await.unwrap();
        assert_eq!(flow.state(), &UploadState::Failed(SERVER_UNREACHABLE_TEXT.to_string()));
    }

    #[test]
    fn test_submit_while_submitting_is_ignored() {
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();
        let outgoing = flow.begin_submit().unwrap();

        assert_eq!(flow.begin_submit().unwrap_err(), UploadRejected::InFlight);
        assert_eq!(flow.select_file(resume()), Err(UploadRejected::InFlight));
        assert_eq!(flow.state(), &UploadState::Submitting);
        assert_eq!(flow.notice(), None);

        assert!(flow.complete_submit(outgoing.ticket, Ok(UploadReceipt::default())));
        assert_eq!(flow.state(), &UploadState::Succeeded);
    }

    #[test]
    fn test_file_not_retained_after_completion() {
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();
        let outgoing = flow.begin_submit().unwrap();
        assert_eq!(outgoing.file, resume());
        assert_eq!(flow.selected_file(), None);

        flow.complete_submit(
            outgoing.ticket,
            Err(BackendError::Transport("reset".to_string())),
        );

        // Retrying needs a new selection.
        assert_eq!(flow.begin_submit().unwrap_err(), UploadRejected::NoFileSelected);
        assert_eq!(flow.state(), &UploadState::Failed(SERVER_UNREACHABLE_TEXT.to_string()));
    }

    #[test]
    fn test_reselection_keeps_outcome_until_next_completion() {
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();
        let first = flow.begin_submit().unwrap();
        flow.complete_submit(
            first.ticket,
            Err(BackendError::Rejected {
                status: 422,
                message: Some("not a resume".to_string()),
            }),
        );

        flow.select_file(ResumeFile::new("/tmp/cv.pdf")).unwrap();
        assert_eq!(flow.selected_file().map(|f| f.file_name.as_str()), Some("cv.pdf"));
        assert_eq!(
            flow.notice(),
            Some(&UploadNotice::Failure("not a resume".to_string()))
        );

        let second = flow.begin_submit().unwrap();
        assert_eq!(
            flow.notice(),
            Some(&UploadNotice::Failure("not a resume".to_string()))
        );
        flow.complete_submit(second.ticket, Ok(UploadReceipt::default()));
        assert!(matches!(flow.notice(), Some(UploadNotice::Success(_))));
    }

    #[test]
    fn test_selection_clears_validation_notice() {
        let mut flow = UploadFlow::new();
        assert!(flow.begin_submit().is_err());
        assert!(matches!(flow.notice(), Some(UploadNotice::Validation(_))));

        flow.select_file(resume()).unwrap();
        assert_eq!(flow.notice(), None);
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut flow = UploadFlow::new();
        flow.select_file(resume()).unwrap();
        let first = flow.begin_submit().unwrap();
        assert!(flow.complete_submit(first.ticket, Ok(UploadReceipt::default())));

        // A duplicate completion for the same ticket changes nothing.
        assert!(!flow.complete_submit(
            first.ticket,
            Err(BackendError::Transport("late".to_string()))
        ));
        assert_eq!(flow.state(), &UploadState::Succeeded);
    }

    #[test]
    fn test_pick_checks_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Resume.PDF");
        let txt = dir.path().join("notes.txt");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        fs::write(&txt, b"hello").unwrap();
        let allowed = vec!["pdf".to_string()];

        let picked = ResumeFile::pick(&pdf, &allowed).unwrap();
        assert_eq!(picked.file_name, "Resume.PDF");

        assert!(matches!(
            ResumeFile::pick(&txt, &allowed),
            Err(PickError::Extension { .. })
        ));
        assert!(ResumeFile::pick(&txt, &[]).is_ok());
        assert!(matches!(
            ResumeFile::pick(&dir.path().join("missing.pdf"), &allowed),
            Err(PickError::NotFound(_))
        ));
        assert!(matches!(
            ResumeFile::pick(dir.path(), &[]),
            Err(PickError::NotAFile(_))
        ));
    }
}
