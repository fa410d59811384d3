//! Full-screen interactive mode.

mod fetch;
mod keys;
mod render;
mod state;

use std::io::{self, Stdout};
use std::sync::Arc;

use anyhow::Result;
use classroom_core::entities::CourseRef;
use classroom_core::ports::ClassroomApi;
use crossterm::event::{Event as TermEvent, EventStream};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use self::fetch::spawn_fetch;
use self::keys::key_action;
use self::state::{App, Command, Event};

/// Raw mode plus alternate screen, restored on drop even when the loop errors
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = stdout.execute(EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Run the interactive UI until the user quits.
///
/// `authenticated` reflects the saved credential at startup; `course` is the
/// configured default class, if any.
pub async fn run(
    api: Arc<dyn ClassroomApi>,
    authenticated: bool,
    course: Option<CourseRef>,
) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut app = App::new(authenticated, course);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut keys = EventStream::new();
    let mut in_flight: Option<JoinHandle<()>> = None;

    info!("interactive session started");

    loop {
        guard.terminal.draw(|frame| render::draw(frame, &app))?;

        let event = tokio::select! {
            input = keys.next() => match input {
                Some(Ok(TermEvent::Key(key))) => match key_action(key) {
                    Some(action) => Event::Key(action),
                    None => continue,
                },
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(event) = rx.recv() => event,
        };

        match app.handle(event) {
            Command::None => {}
            Command::Fetch(request) => {
                if let Some(handle) = in_flight.take() {
                    handle.abort();
                }
                debug!(id = request.id, target = ?request.target, "fetch started");
                in_flight = Some(spawn_fetch(api.clone(), request, tx.clone()));
            }
            Command::CancelFetch => {
                if let Some(handle) = in_flight.take() {
                    debug!("fetch cancelled");
                    handle.abort();
                }
            }
            Command::Exit => break,
        }
    }

    if let Some(handle) = in_flight.take() {
        handle.abort();
    }
    info!("interactive session ended");
    Ok(())
}
