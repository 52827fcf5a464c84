//! Terminal session: raw mode, mouse capture and event translation

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind},
    terminal,
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// What the pointer did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Drag,
    Up,
    Moved,
}

/// Input events relevant to the page studio
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    Key(KeyCode),
    Pointer { column: u16, row: u16, action: PointerAction },
    Resize { width: u16, height: u16 },
    Quit,
}

/// Maps a crossterm event; only the primary button drives gestures
pub fn translate_event(event: Event) -> Option<StudioEvent> {
    match event {
        Event::Key(KeyEvent { code, modifiers, .. }) => {
            if modifiers.contains(KeyModifiers::CONTROL) {
                if let KeyCode::Char('c') | KeyCode::Char('d') = code {
                    return Some(StudioEvent::Quit);
                }
            }
            match code {
                KeyCode::Char('q') | KeyCode::Esc => Some(StudioEvent::Quit),
                _ => Some(StudioEvent::Key(code)),
            }
        }
        Event::Mouse(MouseEvent { column, row, kind, .. }) => {
            let action = match kind {
                MouseEventKind::Down(MouseButton::Left) => PointerAction::Down,
                MouseEventKind::Drag(MouseButton::Left) => PointerAction::Drag,
                MouseEventKind::Up(MouseButton::Left) => PointerAction::Up,
                MouseEventKind::Moved => PointerAction::Moved,
                _ => return None,
            };
            Some(StudioEvent::Pointer { column, row, action })
        }
        Event::Resize(width, height) => Some(StudioEvent::Resize { width, height }),
        _ => None,
    }
}

/// Owns the terminal for the lifetime of the studio; restores it on drop
pub struct TerminalSession {
    size: (u16, u16),
}

impl TerminalSession {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            event::EnableMouseCapture
        )?;
        let size = terminal::size().unwrap_or((80, 24));
        Ok(Self { size })
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<StudioEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let translated = translate_event(event::read()?);
        if let Some(StudioEvent::Resize { width, height }) = translated {
            self.size = (width, height);
        }
        Ok(translated)
    }

    /// Writes pre-rendered ANSI output in one go
    pub fn present(&self, frame: &str) -> io::Result<()> {
        let mut out = stdout().lock();
        out.write_all(frame.as_bytes())?;
        out.flush()
    }

    pub fn clear(&self) -> io::Result<()> {
        crossterm::execute!(
            stdout(),
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            stdout(),
            cursor::Show,
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}
