//! Runs flow requests in the background and feeds their results back.
//!
//! Requests are spawned on tokio tasks with a bounded timeout. Each task sends
//! exactly one [`Completion`] into the front end's event channel; the front end
//! hands it back to [`Session::handle_completion`] on its own loop, so flow
//! state is only ever touched from one place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::backend::{AskReply, Backend, UploadReceipt};
use crate::config::Config;
use crate::conversation::{OutgoingTurn, TurnTicket};
use crate::coordinator::{FlowTarget, Slot, ViewCoordinator};
use crate::error::{BackendError, TurnRejected, UploadRejected};
use crate::state::greeting_for;
use crate::upload::UploadTicket;

/// Result of a background request.
#[derive(Debug)]
pub enum Completion {
    Turn {
        target: FlowTarget,
        ticket: TurnTicket,
        outcome: Result<AskReply, BackendError>,
    },
    Upload {
        ticket: UploadTicket,
        outcome: Result<UploadReceipt, BackendError>,
    },
    Ping(Result<String, BackendError>),
}

/// Last known backend liveness, informational only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendStatus {
    #[default]
    Unknown,
    Checking,
    Online(String),
    Offline(String),
}

pub struct Session<E> {
    coordinator: ViewCoordinator,
    backend: Arc<dyn Backend>,
    timeout: Duration,
    events: UnboundedSender<E>,
    tasks: Vec<JoinHandle<()>>,
    backend_status: BackendStatus,
}

impl<E> Session<E>
where
    E: From<Completion> + Send + 'static,
{
    pub fn new(
        coordinator: ViewCoordinator,
        backend: Arc<dyn Backend>,
        timeout: Duration,
        events: UnboundedSender<E>,
    ) -> Self {
        Self {
            coordinator,
            backend,
            timeout,
            events,
            tasks: Vec::new(),
            backend_status: BackendStatus::Unknown,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn Backend>, events: UnboundedSender<E>) -> Self {
        let greeting = greeting_for(config.candidate_name.as_deref());
        let coordinator = ViewCoordinator::new(greeting, config.overlay_mode);
        Self::new(coordinator, backend, config.request_timeout(), events)
    }

    pub fn coordinator(&self) -> &ViewCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut ViewCoordinator {
        &mut self.coordinator
    }

    pub fn backend_status(&self) -> &BackendStatus {
        &self.backend_status
    }

    /// Send whatever is in the input box of the conversation shown at `slot`.
    pub fn send_input(&mut self, slot: Slot) -> Result<(), TurnRejected> {
        let target = self.coordinator.target(slot).ok_or(TurnRejected::Unavailable)?;
        let flow = self
            .coordinator
            .conversation_mut(slot)
            .ok_or(TurnRejected::Unavailable)?;
        let outgoing = flow.submit_input()?;
        self.dispatch_turn(target, outgoing);
        Ok(())
    }

    /// Send `text` as a turn from `slot` without going through the input box.
    pub fn send_text(&mut self, slot: Slot, text: &str) -> Result<(), TurnRejected> {
        let target = self.coordinator.target(slot).ok_or(TurnRejected::Unavailable)?;
        let flow = self
            .coordinator
            .conversation_mut(slot)
            .ok_or(TurnRejected::Unavailable)?;
        let outgoing = flow.begin_turn(text)?;
        self.dispatch_turn(target, outgoing);
        Ok(())
    }

    fn dispatch_turn(&mut self, target: FlowTarget, outgoing: OutgoingTurn) {
        tracing::info!(slot = ?target.slot, epoch = target.epoch, "sending turn");
        let backend = Arc::clone(&self.backend);
        let ticket = outgoing.ticket;
        self.spawn(
            async move { backend.ask(&outgoing.message).await },
            move |outcome| Completion::Turn {
                target,
                ticket,
                outcome,
            },
        );
    }

    pub fn submit_upload(&mut self) -> Result<(), UploadRejected> {
        let outgoing = self.coordinator.upload_mut().begin_submit()?;

        tracing::info!(file = %outgoing.file.file_name, "submitting resume");
        let backend = Arc::clone(&self.backend);
        let ticket = outgoing.ticket;
        self.spawn(
            async move { backend.upload_resume(&outgoing.file).await },
            move |outcome| Completion::Upload { ticket, outcome },
        );
        Ok(())
    }

    /// Probe the backend. Never touches flow state.
    pub fn check_backend(&mut self) {
        if self.backend_status == BackendStatus::Checking {
            return;
        }
        self.backend_status = BackendStatus::Checking;
        let backend = Arc::clone(&self.backend);
        self.spawn(async move { backend.ping().await }, Completion::Ping);
    }

    /// Apply a finished request. Returns false when it was discarded.
    pub fn handle_completion(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Turn {
                target,
                ticket,
                outcome,
            } => self.coordinator.apply_turn(target, ticket, outcome),
            Completion::Upload { ticket, outcome } => {
                self.coordinator.apply_upload(ticket, outcome)
            }
            Completion::Ping(outcome) => {
                self.backend_status = match outcome {
                    Ok(message) => BackendStatus::Online(message),
                    Err(err) => {
                        tracing::warn!(error = %err, "backend liveness check failed");
                        BackendStatus::Offline(err.to_string())
                    }
                };
                true
            }
        }
    }

    /// Number of requests still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Abort every running request. Their completions are never delivered.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn spawn<T, F, W>(&mut self, request: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, BackendError>> + Send + 'static,
        W: FnOnce(Result<T, BackendError>) -> Completion + Send + 'static,
    {
        let timeout = self.timeout;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, request).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(timeout)),
            };
            if events.send(E::from(wrap(outcome))).is_err() {
                tracing::debug!("event loop gone, dropping completion");
            }
        });

        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }
}

impl<E> Drop for Session<E> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayMode;
    use crate::coordinator::View;
    use crate::error::{BACKEND_UNREACHABLE_TEXT, SERVER_UNREACHABLE_TEXT};
    use crate::state::ChatMessage;
    use crate::testing::ScriptedBackend;
    use crate::upload::{ResumeFile, UploadState};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn start(
        backend: Arc<ScriptedBackend>,
        timeout: Duration,
        mode: OverlayMode,
    ) -> (Session<Completion>, UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = ViewCoordinator::new("hello", mode);
        (Session::new(coordinator, backend, timeout, tx), rx)
    }

    async fn pump_one(session: &mut Session<Completion>, rx: &mut UnboundedReceiver<Completion>) -> bool {
        let completion = rx.recv().await.expect("completion");
        session.handle_completion(completion)
    }

    #[tokio::test]
    async fn test_turn_round_trip() {
        let backend = Arc::new(ScriptedBackend::new());
        let (mut session, mut rx) = start(backend.clone(), Duration::from_secs(5), OverlayMode::Separate);
        session.coordinator_mut().select_view(View::Chat);
        session
            .coordinator_mut()
            .conversation_mut(Slot::Primary)
            .unwrap()
            .input_mut()
            .set("What are my top skills?");

        session.send_input(Slot::Primary).unwrap();
        assert!(session.coordinator().conversation(Slot::Primary).unwrap().is_busy());

        assert!(pump_one(&mut session, &mut rx).await);

        let flow = session.coordinator().conversation(Slot::Primary).unwrap();
        assert!(!flow.is_busy());
        assert_eq!(
            flow.transcript().last(),
            Some(&ChatMessage::assistant("echo: What are my top skills?"))
        );
    }

    #[tokio::test]
    async fn test_second_send_while_pending_makes_no_request() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.hang_next_ask();
        let (mut session, _rx) = start(backend.clone(), Duration::from_secs(5), OverlayMode::Separate);

        session.send_text(Slot::Primary, "first").unwrap();
        tokio::task::yield_now().await;
        assert_eq!(
            session.send_text(Slot::Primary, "Tell me about project X"),
            Err(TurnRejected::Busy)
        );
        tokio::task::yield_now().await;

        assert_eq!(backend.ask_calls(), 1);
        assert_eq!(session.coordinator().conversation(Slot::Primary).unwrap().transcript().len(), 2);
        session.shutdown();
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_stuck_request_times_out_as_transport_failure() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.hang_next_ask();
        let (mut session, mut rx) = start(backend.clone(), Duration::from_millis(50), OverlayMode::Separate);

        session.send_text(Slot::Primary, "anyone there?").unwrap();
        let completion = rx.recv().await.expect("completion");
        assert!(matches!(
            &completion,
            Completion::Turn { outcome: Err(BackendError::Timeout(_)), .. }
        ));
        assert!(session.handle_completion(completion));

        let flow = session.coordinator().conversation(Slot::Primary).unwrap();
        assert!(!flow.is_busy());
        assert_eq!(
            flow.transcript().last(),
            Some(&ChatMessage::assistant(BACKEND_UNREACHABLE_TEXT))
        );

        // The user can retry.
        session.send_text(Slot::Primary, "retry").unwrap();
        assert!(pump_one(&mut session, &mut rx).await);
        assert_eq!(session.coordinator().conversation(Slot::Primary).unwrap().transcript().len(), 5);
    }

    #[tokio::test]
    async fn test_upload_round_trip_and_timeout() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.hang_next_upload();
        let (mut session, mut rx) = start(backend.clone(), Duration::from_millis(50), OverlayMode::Off);

        assert_eq!(session.submit_upload(), Err(UploadRejected::NoFileSelected));
        assert_eq!(backend.upload_calls(), 0);

        session
            .coordinator_mut()
            .upload_mut()
            .select_file(ResumeFile::new("/tmp/resume.pdf"))
            .unwrap();
        session.submit_upload().unwrap();
        assert_eq!(session.submit_upload(), Err(UploadRejected::InFlight));

        assert!(pump_one(&mut session, &mut rx).await);
        assert_eq!(
            session.coordinator().upload().state(),
            &UploadState::Failed(SERVER_UNREACHABLE_TEXT.to_string())
        );

        session
            .coordinator_mut()
            .upload_mut()
            .select_file(ResumeFile::new("/tmp/resume.pdf"))
            .unwrap();
        session.submit_upload().unwrap();
        assert!(pump_one(&mut session, &mut rx).await);
        assert_eq!(session.coordinator().upload().state(), &UploadState::Succeeded);
        assert_eq!(backend.upload_calls(), 2);
    }

    #[tokio::test]
    async fn test_overlay_reply_after_reset_is_dropped() {
        let backend = Arc::new(ScriptedBackend::new());
        let (mut session, mut rx) = start(backend.clone(), Duration::from_secs(5), OverlayMode::Separate);

        session.send_text(Slot::Overlay, "scratch").unwrap();
        assert!(session.coordinator_mut().reset_overlay());

        assert!(!pump_one(&mut session, &mut rx).await);
        let overlay = session.coordinator().conversation(Slot::Overlay).unwrap();
        assert_eq!(overlay.transcript().len(), 1);
        assert!(!overlay.is_busy());
    }

    #[tokio::test]
    async fn test_primary_and_overlay_run_independently() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.hang_on("stuck");
        let (mut session, mut rx) = start(backend.clone(), Duration::from_secs(5), OverlayMode::Separate);

        session.send_text(Slot::Primary, "stuck").unwrap();
        session.send_text(Slot::Overlay, "quick").unwrap();

        assert!(pump_one(&mut session, &mut rx).await);
        let coordinator = session.coordinator();
        assert!(coordinator.conversation(Slot::Primary).unwrap().is_busy());
        assert!(!coordinator.conversation(Slot::Overlay).unwrap().is_busy());
        assert_eq!(coordinator.conversation(Slot::Overlay).unwrap().transcript().len(), 3);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_backend_check_updates_status() {
        let backend = Arc::new(ScriptedBackend::new());
        let (mut session, mut rx) = start(backend, Duration::from_secs(5), OverlayMode::Separate);

        session.check_backend();
        assert_eq!(session.backend_status(), &BackendStatus::Checking);
        assert!(pump_one(&mut session, &mut rx).await);
        assert_eq!(
            session.backend_status(),
            &BackendStatus::Online("Backend is live".to_string())
        );
    }
}
