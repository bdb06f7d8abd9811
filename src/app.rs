// App state and main event loop.
// Runs the build monitor until the user quits; quitting cancels polling.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::prelude::*;

use crate::polling::PollHandle;
use crate::state::MonitorState;
use crate::ui;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Main application state.
pub struct App {
    pub state: MonitorState,
    handle: PollHandle,
    /// Whether the app should exit.
    pub should_quit: bool,
}

impl App {
    pub fn new(handle: PollHandle) -> Self {
        Self {
            state: MonitorState::new(handle.current()),
            handle,
            should_quit: false,
        }
    }

    /// Main event loop.
    pub async fn run(&mut self, terminal: &mut Terminal<impl Backend>) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| ui::draw(frame, &mut self.state))?;
            self.drain_events();
            self.handle_input()?;
            tokio::time::sleep(FRAME_INTERVAL).await;
        }
        self.handle.cancel();
        Ok(())
    }

    /// Apply every event the poller has delivered since the last frame.
    fn drain_events(&mut self) {
        while let Some(event) = self.handle.try_next_event() {
            self.state.apply(event);
        }
    }

    #[allow(clippy::collapsible_if)]
    fn handle_input(&mut self) -> io::Result<()> {
        if event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                        KeyCode::Up | KeyCode::Char('k') => self.state.select_prev(),
                        KeyCode::Down | KeyCode::Char('j') => self.state.select_next(),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}
