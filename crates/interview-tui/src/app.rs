use std::path::PathBuf;
use std::sync::Arc;

use interview_core::{
    Backend, Completion, Config, ConversationFlow, InputBuffer, OverlayMode, ResumeFile,
    Session, Slot, View,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which surface receives keys: the selected view or the floating chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Primary,
    Overlay,
}

/// Scroll position and last rendered size of one transcript pane.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatScroll {
    pub offset: u16,
    pub height: u16, // inner height, for scroll calculations
    pub width: u16,  // inner width, for wrap calculations
}

/// Path entry popup used to choose the resume file.
#[derive(Debug, Default)]
pub struct FilePicker {
    pub open: bool,
    pub input: InputBuffer,
    pub error: Option<String>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: Focus,
    pub session: Session<AppEvent>,
    pub resume_extensions: Vec<String>,

    pub file_picker: FilePicker,

    // Per-conversation scroll state
    pub chat_scroll: ChatScroll,
    pub overlay_scroll: ChatScroll,

    // Last rendered areas for mouse hit-testing
    pub chat_area: Option<Rect>,
    pub overlay_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config, backend: Arc<dyn Backend>, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: Focus::Primary,
            session: Session::from_config(config, backend, events),
            resume_extensions: config.resume_extensions.clone(),
            file_picker: FilePicker::default(),
            chat_scroll: ChatScroll::default(),
            overlay_scroll: ChatScroll::default(),
            chat_area: None,
            overlay_area: None,
            animation_frame: 0,
        }
    }

    pub fn view(&self) -> View {
        self.session.coordinator().view()
    }

    pub fn select_view(&mut self, view: View) {
        self.session.coordinator_mut().select_view(view);
        self.focus = Focus::Primary;
        self.input_mode = InputMode::Normal;
    }

    /// Conversation that keys currently go to, if any.
    pub fn focused_slot(&self) -> Option<Slot> {
        match self.focus {
            Focus::Overlay if self.session.coordinator().overlay_expanded() => Some(Slot::Overlay),
            _ if self.view() == View::Chat => Some(Slot::Primary),
            _ => None,
        }
    }

    pub fn conversation(&self, slot: Slot) -> Option<&ConversationFlow> {
        self.session.coordinator().conversation(slot)
    }

    pub fn toggle_overlay(&mut self) {
        let expanded = self.session.coordinator_mut().toggle_overlay();
        self.focus = if expanded { Focus::Overlay } else { Focus::Primary };
        self.input_mode = InputMode::Normal;
        if expanded {
            self.scroll_to_bottom(Slot::Overlay);
        }
    }

    pub fn collapse_overlay(&mut self) {
        self.session.coordinator_mut().set_overlay_expanded(false);
        self.focus = Focus::Primary;
        self.input_mode = InputMode::Normal;
    }

    /// Tab: move focus between the view and the expanded overlay.
    pub fn cycle_focus(&mut self) {
        if !self.session.coordinator().overlay_expanded() {
            self.focus = Focus::Primary;
            return;
        }
        self.focus = match self.focus {
            Focus::Primary => Focus::Overlay,
            Focus::Overlay => Focus::Primary,
        };
        self.input_mode = InputMode::Normal;
    }

    /// Send the focused conversation's input box.
    pub fn send_focused_input(&mut self) {
        let Some(slot) = self.focused_slot() else { return };
        match self.session.send_input(slot) {
            Ok(()) => {
                self.input_mode = InputMode::Normal;
                // Scroll to bottom so "Thinking..." is visible
                self.scroll_to_bottom(slot);
            }
            Err(reason) => tracing::debug!(?slot, %reason, "message not sent"),
        }
    }

    pub fn reset_overlay(&mut self) {
        if self.session.coordinator_mut().reset_overlay() {
            self.overlay_scroll.offset = 0;
        }
    }

    pub fn open_file_picker(&mut self) {
        let current = self
            .session
            .coordinator()
            .upload()
            .selected_file()
            .map(|f| f.path.display().to_string())
            .unwrap_or_default();
        self.file_picker.input.set(&current);
        self.file_picker.error = None;
        self.file_picker.open = true;
    }

    pub fn close_file_picker(&mut self) {
        self.file_picker.open = false;
        self.file_picker.error = None;
    }

    /// Validate the typed path and hand it to the upload flow.
    pub fn confirm_file_picker(&mut self) {
        let path = expand_tilde(self.file_picker.input.as_str().trim());
        let file = match ResumeFile::pick(&path, &self.resume_extensions) {
            Ok(file) => file,
            Err(err) => {
                self.file_picker.error = Some(err.to_string());
                return;
            }
        };
        match self.session.coordinator_mut().upload_mut().select_file(file) {
            Ok(()) => self.close_file_picker(),
            Err(err) => self.file_picker.error = Some(err.to_string()),
        }
    }

    pub fn submit_upload(&mut self) {
        if let Err(reason) = self.session.submit_upload() {
            tracing::debug!(%reason, "upload not started");
        }
    }

    pub fn handle_completion(&mut self, completion: Completion) {
        let slot = match &completion {
            Completion::Turn { target, .. } => Some(target.slot),
            _ => None,
        };
        if !self.session.handle_completion(completion) {
            return;
        }
        if let Some(slot) = slot {
            self.scroll_to_bottom(slot);
            if self.session.coordinator().overlay_mode() == OverlayMode::Shared {
                self.scroll_to_bottom(Slot::Overlay);
            }
        }
    }

    fn any_busy(&self) -> bool {
        let coordinator = self.session.coordinator();
        coordinator.upload().is_submitting()
            || [Slot::Primary, Slot::Overlay]
                .into_iter()
                .filter_map(|slot| coordinator.conversation(slot))
                .any(ConversationFlow::is_busy)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.any_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_state_mut(&mut self, slot: Slot) -> &mut ChatScroll {
        match slot {
            Slot::Primary => &mut self.chat_scroll,
            Slot::Overlay => &mut self.overlay_scroll,
        }
    }

    pub fn scroll_down(&mut self, slot: Slot, lines: u16) {
        let total = self.total_lines(slot);
        let scroll = self.scroll_state_mut(slot);
        let max = total.saturating_sub(scroll.height);
        scroll.offset = scroll.offset.saturating_add(lines).min(max);
    }

    pub fn scroll_up(&mut self, slot: Slot, lines: u16) {
        let scroll = self.scroll_state_mut(slot);
        scroll.offset = scroll.offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self, slot: Slot) {
        let total = self.total_lines(slot);
        let scroll = self.scroll_state_mut(slot);
        // Default to 20 rows before the first render
        let visible_height = if scroll.height > 0 { scroll.height } else { 20 };
        scroll.offset = total.saturating_sub(visible_height);
    }

    /// Estimated wrapped height of a transcript, including the busy indicator.
    fn total_lines(&self, slot: Slot) -> u16 {
        let Some(flow) = self.conversation(slot) else { return 0 };
        let width = match slot {
            Slot::Primary => self.chat_scroll.width,
            Slot::Overlay => self.overlay_scroll.width,
        };
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if width > 0 { width as usize } else { 50 };

        let mut total_lines: usize = 0;
        for msg in flow.transcript().iter() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                total_lines += char_count / wrap_width + 1;
            }
            total_lines += 1; // Blank line after message
        }
        if flow.is_busy() {
            total_lines += 2; // "AI:" + "Thinking..."
        }
        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
