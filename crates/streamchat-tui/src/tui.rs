use std::io::{self, Stderr};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::{Stream, StreamExt};
use streamchat_core::Snapshot;
use tokio::sync::{mpsc, watch};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// The coordinator published a new state or appended output.
    Stream(Snapshot),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(mut updates: watch::Receiver<Snapshot>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            forward_terminal_events(event::EventStream::new(), tx_events).await;
            tracing::debug!("terminal event reader stopped");
        });

        // Forward coordinator snapshots so every append triggers a redraw
        let tx_stream = tx.clone();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if tx_stream.send(AppEvent::Stream(snapshot)).is_err() {
                    break;
                }
            }
        });

        // Spawn tick timer for the "Sending..." animation (300ms interval)
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Forward terminal events until the input ends, fails, or the app stops listening.
async fn forward_terminal_events<S>(mut reader: S, tx: mpsc::UnboundedSender<AppEvent>)
where
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    while let Some(evt) = reader.next().await {
        let Ok(evt) = evt else { break };
        if let Some(event) = translate(evt) {
            if tx.send(event).is_err() {
                break;
            }
        }
    }
}

/// Map a terminal event to an app event; key releases and focus changes are dropped.
fn translate(evt: Event) -> Option<AppEvent> {
    match evt {
        // Only handle key press events, not release
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
        _ => None,
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture for scrolling the response pane
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventKind, KeyEventState, KeyModifiers};
    use futures_util::stream;

    fn key(code: KeyCode, kind: KeyEventKind) -> io::Result<Event> {
        Ok(Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }))
    }

    #[tokio::test]
    async fn test_reader_stops_when_input_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = stream::iter(vec![
            key(KeyCode::Char('a'), KeyEventKind::Press),
            key(KeyCode::Char('a'), KeyEventKind::Release),
            Ok(Event::Resize(80, 24)),
        ]);

        forward_terminal_events(input, tx).await;

        assert!(matches!(rx.recv().await, Some(AppEvent::Key(_))));
        assert!(matches!(rx.recv().await, Some(AppEvent::Resize(80, 24))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_stops_on_input_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // An endless failing input must not keep the reader busy.
        let input = stream::iter(vec![key(KeyCode::Enter, KeyEventKind::Press)])
            .chain(stream::repeat_with(|| Err(io::Error::other("terminal gone"))));

        forward_terminal_events(input, tx).await;

        assert!(matches!(rx.recv().await, Some(AppEvent::Key(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_stops_when_app_stops_listening() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let input = stream::iter(vec![key(KeyCode::Char('x'), KeyEventKind::Press)])
            .chain(stream::pending());

        forward_terminal_events(input, tx).await;
    }
}
