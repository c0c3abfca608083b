use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind,
        MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use interview_core::Completion;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedSender};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Drives the "Thinking..." and "Uploading..." animations.
const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// A backend request finished
    Backend(Completion),
}

impl From<Completion> for AppEvent {
    fn from(completion: Completion) -> Self {
        AppEvent::Backend(completion)
    }
}

/// Terminal input, animation ticks and backend completions, all on one channel
/// so they are handled one at a time.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_terminal_reader(tx.clone());
        spawn_ticker(tx.clone(), TICK_RATE);
        Self { rx, tx }
    }

    /// Sender handed to the session for backend completions.
    pub fn sender(&self) -> UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

fn translate(event: Event) -> Option<AppEvent> {
    match event {
        // Key release and repeat events are reported on some platforms
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
        _ => None,
    }
}

fn spawn_terminal_reader(tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        while let Some(read) = reader.next().await {
            let event = match read {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!(error = %err, "terminal input closed");
                    break;
                }
            };
            if let Some(event) = translate(event) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_ticker(tx: UnboundedSender<AppEvent>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stderr()))?)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Put the terminal back before the panic message is printed.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    use super::*;

    fn key_event(kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent {
            code: KeyCode::Char('x'),
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn test_only_key_presses_are_forwarded() {
        assert!(matches!(
            translate(key_event(KeyEventKind::Press)),
            Some(AppEvent::Key(_))
        ));
        assert!(translate(key_event(KeyEventKind::Release)).is_none());
        assert!(matches!(
            translate(Event::Resize(80, 24)),
            Some(AppEvent::Resize(80, 24))
        ));
        assert!(translate(Event::FocusGained).is_none());
    }

    #[tokio::test]
    async fn test_ticker_and_completions_share_the_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_ticker(tx.clone(), Duration::from_millis(10));
        tx.send(AppEvent::from(Completion::Ping(Ok("Backend is live".to_string()))))
            .unwrap();

        let mut saw_tick = false;
        let mut saw_completion = false;
        while !(saw_tick && saw_completion) {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("event in time")
                .expect("channel open");
            match event {
                AppEvent::Tick => saw_tick = true,
                AppEvent::Backend(Completion::Ping(Ok(message))) => {
                    assert_eq!(message, "Backend is live");
                    saw_completion = true;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }
}
