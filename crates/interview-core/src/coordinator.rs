//! Which flow is on screen, and where replies go.
//!
//! The primary surface is either the upload form or the chat. Independently
//! of that, a floating overlay can present a conversation too. Switching
//! views never resets a flow.

use crate::backend::{AskReply, UploadReceipt};
use crate::config::OverlayMode;
use crate::conversation::{ConversationFlow, TurnTicket};
use crate::error::BackendError;
use crate::upload::{UploadFlow, UploadTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    Chat,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Upload => "Upload Resume",
            View::Chat => "Interview Chat",
        }
    }
}

/// A place a conversation is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Primary,
    Overlay,
}

/// Liveness token carried by every chat request: the slot that owns the
/// conversation and that slot's epoch when the request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTarget {
    pub slot: Slot,
    pub epoch: u64,
}

#[derive(Debug)]
struct Overlay {
    /// `None` when the overlay shares the primary conversation.
    flow: Option<ConversationFlow>,
    expanded: bool,
    epoch: u64,
}

#[derive(Debug)]
pub struct ViewCoordinator {
    view: View,
    upload: UploadFlow,
    chat: ConversationFlow,
    overlay: Option<Overlay>,
    greeting: String,
}

impl ViewCoordinator {
    pub fn new(greeting: impl Into<String>, overlay_mode: OverlayMode) -> Self {
        let greeting = greeting.into();
        let overlay = match overlay_mode {
            OverlayMode::Off => None,
            OverlayMode::Shared => Some(Overlay {
                flow: None,
                expanded: false,
                epoch: 0,
            }),
            OverlayMode::Separate => Some(Overlay {
                flow: Some(ConversationFlow::new(greeting.clone())),
                expanded: false,
                epoch: 0,
            }),
        };

        Self {
            view: View::Upload,
            upload: UploadFlow::new(),
            chat: ConversationFlow::new(greeting.clone()),
            overlay,
            greeting,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn select_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn upload(&self) -> &UploadFlow {
        &self.upload
    }

    pub fn upload_mut(&mut self) -> &mut UploadFlow {
        &mut self.upload
    }

    pub fn overlay_mode(&self) -> OverlayMode {
        match &self.overlay {
            None => OverlayMode::Off,
            Some(Overlay { flow: None, .. }) => OverlayMode::Shared,
            Some(Overlay { flow: Some(_), .. }) => OverlayMode::Separate,
        }
    }

    pub fn overlay_expanded(&self) -> bool {
        self.overlay.as_ref().is_some_and(|o| o.expanded)
    }

    /// Returns the new expanded state, false when there is no overlay.
    pub fn toggle_overlay(&mut self) -> bool {
        match self.overlay.as_mut() {
            Some(overlay) => {
                overlay.expanded = !overlay.expanded;
                overlay.expanded
            }
            None => false,
        }
    }

    pub fn set_overlay_expanded(&mut self, expanded: bool) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.expanded = expanded;
        }
    }

    /// The slot whose conversation is actually shown at `slot`.
    fn owner(&self, slot: Slot) -> Option<Slot> {
        match (slot, &self.overlay) {
            (Slot::Primary, _) => Some(Slot::Primary),
            (Slot::Overlay, None) => None,
            (Slot::Overlay, Some(Overlay { flow: None, .. })) => Some(Slot::Primary),
            (Slot::Overlay, Some(Overlay { flow: Some(_), .. })) => Some(Slot::Overlay),
        }
    }

    pub fn conversation(&self, slot: Slot) -> Option<&ConversationFlow> {
        match self.owner(slot)? {
            Slot::Primary => Some(&self.chat),
            Slot::Overlay => self.overlay.as_ref().and_then(|o| o.flow.as_ref()),
        }
    }

    pub fn conversation_mut(&mut self, slot: Slot) -> Option<&mut ConversationFlow> {
        match self.owner(slot)? {
            Slot::Primary => Some(&mut self.chat),
            Slot::Overlay => self.overlay.as_mut().and_then(|o| o.flow.as_mut()),
        }
    }

    /// Liveness token for a request issued from `slot` right now.
    pub fn target(&self, slot: Slot) -> Option<FlowTarget> {
        let owner = self.owner(slot)?;
        let epoch = match owner {
            Slot::Primary => 0,
            Slot::Overlay => self.overlay.as_ref().map(|o| o.epoch)?,
        };
        Some(FlowTarget { slot: owner, epoch })
    }

    /// Throw away the overlay's own conversation and start a fresh one.
    /// Replies still in flight for the old one are discarded when they land.
    ///
    /// Only possible for a separate overlay.
    pub fn reset_overlay(&mut self) -> bool {
        match self.overlay.as_mut() {
            Some(overlay) if overlay.flow.is_some() => {
                overlay.flow = Some(ConversationFlow::new(self.greeting.clone()));
                overlay.epoch += 1;
                tracing::debug!(epoch = overlay.epoch, "overlay conversation reset");
                true
            }
            _ => false,
        }
    }

    /// Route a chat reply to its conversation. Returns false when the
    /// conversation it was issued from no longer exists.
    pub fn apply_turn(
        &mut self,
        target: FlowTarget,
        ticket: TurnTicket,
        outcome: Result<AskReply, BackendError>,
    ) -> bool {
        if self.target(target.slot) != Some(target) {
            tracing::debug!(?target, "discarding reply for a discarded conversation");
            return false;
        }
        match self.conversation_mut(target.slot) {
            Some(flow) => flow.complete_turn(ticket, outcome),
            None => false,
        }
    }

    pub fn apply_upload(
        &mut self,
        ticket: UploadTicket,
        outcome: Result<UploadReceipt, BackendError>,
    ) -> bool {
        self.upload.complete_submit(ticket, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;
    use crate::upload::ResumeFile;

    fn reply(text: &str) -> Result<AskReply, BackendError> {
        Ok(AskReply {
            response: Some(text.to_string()),
        })
    }

    #[test]
    fn test_starts_on_upload_view() {
        let coordinator = ViewCoordinator::new("hi", OverlayMode::Separate);
        assert_eq!(coordinator.view(), View::Upload);
        assert!(!coordinator.overlay_expanded());
    }

    #[test]
    fn test_switching_views_keeps_flow_state() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Separate);
        coordinator
            .upload_mut()
            .select_file(ResumeFile::new("/tmp/resume.pdf"))
            .unwrap();
        coordinator
            .conversation_mut(Slot::Primary)
            .unwrap()
            .input_mut()
            .set("draft");

        coordinator.select_view(View::Chat);
        coordinator.select_view(View::Upload);
        coordinator.select_view(View::Chat);

        assert!(coordinator.upload().selected_file().is_some());
        assert_eq!(
            coordinator.conversation(Slot::Primary).unwrap().input().as_str(),
            "draft"
        );
    }

    #[test]
    fn test_overlay_toggle_is_independent_of_view() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Separate);
        assert!(coordinator.toggle_overlay());
        coordinator.select_view(View::Chat);
        assert!(coordinator.overlay_expanded());
        assert!(!coordinator.toggle_overlay());
        assert_eq!(coordinator.view(), View::Chat);
    }

    #[test]
    fn test_separate_overlay_has_its_own_transcript() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Separate);
        let outgoing = coordinator
            .conversation_mut(Slot::Overlay)
            .unwrap()
            .begin_turn("scratch question")
            .unwrap();
        let target = coordinator.target(Slot::Overlay).unwrap();

        assert!(coordinator.apply_turn(target, outgoing.ticket, reply("scratch answer")));

        assert_eq!(coordinator.conversation(Slot::Overlay).unwrap().transcript().len(), 3);
        assert_eq!(coordinator.conversation(Slot::Primary).unwrap().transcript().len(), 1);
    }

    #[test]
    fn test_shared_overlay_presents_primary_conversation() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Shared);
        let outgoing = coordinator
            .conversation_mut(Slot::Overlay)
            .unwrap()
            .begin_turn("from the overlay")
            .unwrap();
        let target = coordinator.target(Slot::Overlay).unwrap();
        assert_eq!(target.slot, Slot::Primary);

        assert!(coordinator.apply_turn(target, outgoing.ticket, reply("answer")));

        let primary = coordinator.conversation(Slot::Primary).unwrap().transcript();
        assert_eq!(primary.messages()[1], ChatMessage::user("from the overlay"));
        assert_eq!(primary.len(), 3);
        assert!(!coordinator.reset_overlay());
    }

    #[test]
    fn test_overlay_off() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Off);
        assert!(coordinator.conversation(Slot::Overlay).is_none());
        assert!(coordinator.target(Slot::Overlay).is_none());
        assert!(!coordinator.toggle_overlay());
        assert_eq!(coordinator.overlay_mode(), OverlayMode::Off);
    }

    #[test]
    fn test_reply_for_reset_overlay_is_discarded() {
        let mut coordinator = ViewCoordinator::new("hi", OverlayMode::Separate);
        let outgoing = coordinator
            .conversation_mut(Slot::Overlay)
            .unwrap()
            .begin_turn("old question")
            .unwrap();
        let stale = coordinator.target(Slot::Overlay).unwrap();

        assert!(coordinator.reset_overlay());
        assert!(!coordinator.apply_turn(stale, outgoing.ticket, reply("late answer")));

        let fresh = coordinator.conversation(Slot::Overlay).unwrap();
        assert_eq!(fresh.transcript().messages(), &[ChatMessage::assistant("hi")]);
        assert!(!fresh.is_busy());
        assert_eq!(coordinator.target(Slot::Overlay).unwrap().epoch, 1);
    }
}
