use std::collections::BTreeSet;
use std::io::{self, Write};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use refmark_core::DispatchContext;

mod painter;
mod viewport;

pub use painter::{Frame, RowPainter};
pub use viewport::TerminalViewport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A digit pressed outside of text entry.
    Shortcut(char),
    NextMatch,
    PrevMatch,
    ClearHighlights,
    ScrollLines(isize),
    ScrollPages(isize),
    Top,
    Bottom,
    BeginFind,
    FindQueryChanged { query: String },
    FindSubmit { query: String },
    FindCancel,
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing a free-text phrase; every printable key goes to the buffer.
    Find,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    mode: InputMode,
    find_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.find_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Digits typed into the find prompt must not trigger shortcuts.
    pub fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            text_input_focused: self.mode == InputMode::Find,
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        if let Event::Resize(columns, rows) = event {
            return UiEvent::Resize { columns, rows };
        }
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Find => self.map_event_find(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => UiEvent::Shortcut(c),
            (KeyCode::Char('n'), KeyModifiers::NONE) => UiEvent::NextMatch,
            (KeyCode::Char('N'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                UiEvent::PrevMatch
            }
            (KeyCode::Char('p'), KeyModifiers::NONE) => UiEvent::PrevMatch,
            (KeyCode::Char('c'), KeyModifiers::NONE) | (KeyCode::Esc, _) => {
                UiEvent::ClearHighlights
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::ScrollLines(1)
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::ScrollLines(-1)
            }
            (KeyCode::PageDown, _) | (KeyCode::Char(' '), KeyModifiers::NONE) => {
                UiEvent::ScrollPages(1)
            }
            (KeyCode::PageUp, _) => UiEvent::ScrollPages(-1),
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => UiEvent::Top,
            (KeyCode::Char('G'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                UiEvent::Bottom
            }
            (KeyCode::End, _) => UiEvent::Bottom,
            (KeyCode::Char('/'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Find);
                UiEvent::BeginFind
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => UiEvent::None,
        }
    }

    fn map_event_find(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::FindCancel
            }
            (KeyCode::Enter, _) => {
                let query = self.find_buffer.trim().to_string();
                self.set_mode(InputMode::Normal);
                UiEvent::FindSubmit { query }
            }
            (KeyCode::Backspace, _) => {
                self.find_buffer.pop();
                UiEvent::FindQueryChanged {
                    query: self.find_buffer.clone(),
                }
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.find_buffer.push(c);
                UiEvent::FindQueryChanged {
                    query: self.find_buffer.clone(),
                }
            }
            _ => UiEvent::None,
        }
    }

    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Find => Some(format!("/{}", self.find_buffer)),
            InputMode::Normal => None,
        }
    }
}

/// What the bottom line should say, most urgent first.
#[derive(Debug, Default)]
pub struct StatusLine<'a> {
    pub pending_input: Option<&'a str>,
    pub announcement: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub match_label: Option<&'a str>,
    pub highlighted_pages: Option<&'a BTreeSet<u32>>,
    /// Pages rendered so far out of the total, while extraction runs.
    pub loading: Option<(usize, usize)>,
}

impl StatusLine<'_> {
    pub fn text(&self) -> String {
        if let Some(pending) = self.pending_input {
            return pending.to_string();
        }
        if let Some(announcement) = self.announcement {
            return announcement.to_string();
        }

        let mut parts = Vec::new();
        if let Some(reference) = self.reference {
            parts.push(reference.to_string());
        }
        if let Some(label) = self.match_label {
            parts.push(label.to_string());
        }
        if let Some(pages) = self.highlighted_pages.filter(|pages| !pages.is_empty()) {
            let list: Vec<String> = pages.iter().map(u32::to_string).collect();
            parts.push(format!("pages {}", list.join(", ")));
        }
        if let Some((rendered, total)) = self.loading {
            parts.push(format!("loading {rendered}/{total}"));
        }
        if parts.is_empty() {
            "1-9 reference  / find  n/N next/prev  c clear  q quit".to_string()
        } else {
            parts.join("  |  ")
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
