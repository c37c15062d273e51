//! Line deep-links carried in the address fragment (`#L42`).
//!
//! The fragment lives in the host's navigation state; the viewer only sees
//! it through [`Navigation`]. [`HighlightController`] turns fragment changes
//! and line clicks into a [`HighlightState`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, trace};

use crate::diagnostics::{DiagnosticEvent, Diagnostics};

pub const INVALID_LINE_FINGERPRINT: &str = "file-renderer-invalid-line-number";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HighlightState {
    #[default]
    Unhighlighted,
    /// 1-based line number, always within the current document.
    Highlighted(usize),
}

impl HighlightState {
    pub fn line_number(self) -> Option<usize> {
        match self {
            HighlightState::Unhighlighted => None,
            HighlightState::Highlighted(n) => Some(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentParse {
    Empty,
    Line(usize),
    Invalid,
}

/// Recognizes exactly `#L<digits>` with the number in `1..=total_lines`.
pub fn parse_fragment(raw: &str, total_lines: usize) -> FragmentParse {
    if raw.is_empty() || raw == "#" {
        return FragmentParse::Empty;
    }
    let Some(digits) = raw.strip_prefix("#L") else {
        return FragmentParse::Invalid;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return FragmentParse::Invalid;
    }
    match digits.parse::<usize>() {
        Ok(n) if (1..=total_lines).contains(&n) => FragmentParse::Line(n),
        _ => FragmentParse::Invalid,
    }
}

pub fn line_fragment(line_number: usize) -> String {
    format!("#L{line_number}")
}

/// How a fragment write touches the navigation history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryMode {
    Replace,
    Push,
}

/// Host navigation as seen by the viewer.
pub trait Navigation {
    /// Current fragment including the leading `#`, or empty.
    fn current_fragment(&self) -> String;

    /// Every later fragment change is delivered on the returned channel.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&mut self) -> Receiver<String>;

    /// `None` clears the fragment.
    fn set_fragment(&mut self, fragment: Option<&str>, mode: HistoryMode);

    /// Whether `set_fragment` is reported back through `subscribe`.
    fn echoes_writes(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    cursor: usize,
    subscribers: Vec<Sender<String>>,
}

impl History {
    fn current(&self) -> &str {
        self.entries.get(self.cursor).map_or("", String::as_str)
    }

    fn broadcast(&mut self) {
        let fragment = self.current().to_string();
        self.subscribers
            .retain(|tx| tx.send(fragment.clone()).is_ok());
    }
}

/// In-process navigation with a history stack. Clones share state, so the
/// host can keep a handle while the viewer owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryNavigation {
    history: Rc<RefCell<History>>,
}

impl MemoryNavigation {
    pub fn new(initial: &str) -> Self {
        let history = History {
            entries: vec![initial.to_string()],
            ..History::default()
        };
        Self {
            history: Rc::new(RefCell::new(history)),
        }
    }

    /// Navigation that did not originate in the viewer, such as the user
    /// typing a new address.
    pub fn navigate(&self, fragment: &str) {
        self.write(Some(fragment), HistoryMode::Push);
    }

    /// Steps back one history entry. Returns false at the oldest entry.
    pub fn back(&self) -> bool {
        let mut history = self.history.borrow_mut();
        if history.cursor == 0 {
            return false;
        }
        history.cursor -= 1;
        history.broadcast();
        true
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    fn write(&self, fragment: Option<&str>, mode: HistoryMode) {
        let mut guard = self.history.borrow_mut();
        let history = &mut *guard;
        let value = fragment.unwrap_or_default().to_string();
        match mode {
            HistoryMode::Replace => match history.entries.get_mut(history.cursor) {
                Some(entry) => *entry = value,
                None => history.entries.push(value),
            },
            HistoryMode::Push => {
                let keep = history.cursor + 1;
                history.entries.truncate(keep);
                history.entries.push(value);
                history.cursor = history.entries.len() - 1;
            }
        }
        history.broadcast();
    }
}

impl Navigation for MemoryNavigation {
    fn current_fragment(&self) -> String {
        self.history.borrow().current().to_string()
    }

    fn subscribe(&mut self) -> Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.history.borrow_mut().subscribers.push(tx);
        rx
    }

    fn set_fragment(&mut self, fragment: Option<&str>, mode: HistoryMode) {
        self.write(fragment, mode);
    }
}

/// Highlight state machine driven by fragment observations and clicks.
#[derive(Debug, Default)]
pub struct HighlightController {
    state: HighlightState,
    /// Fragments we wrote and expect to hear back, oldest first.
    pending_echoes: VecDeque<String>,
}

impl HighlightController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    /// Applies a fragment read from navigation. Returns the line to scroll
    /// into view, if any.
    pub fn observe(
        &mut self,
        raw: &str,
        total_lines: usize,
        diagnostics: &dyn Diagnostics,
    ) -> Option<usize> {
        if self.pending_echoes.front().is_some_and(|echo| echo == raw) {
            self.pending_echoes.pop_front();
            trace!(target: "fragment", raw, "own_write_echo_skipped");
            return None;
        }
        // Notifications arrive in write order, so anything else means the
        // remaining echoes will never come.
        if !self.pending_echoes.is_empty() {
            trace!(target: "fragment", stale = self.pending_echoes.len(), "pending_echoes_dropped");
            self.pending_echoes.clear();
        }

        match parse_fragment(raw, total_lines) {
            FragmentParse::Line(n) => {
                self.state = HighlightState::Highlighted(n);
                debug!(target: "fragment", line = n, "highlight_from_fragment");
                Some(n)
            }
            FragmentParse::Empty => {
                self.state = HighlightState::Unhighlighted;
                None
            }
            FragmentParse::Invalid => {
                self.state = HighlightState::Unhighlighted;
                diagnostics.capture(DiagnosticEvent {
                    message: format!("Invalid line number in file renderer hash: {raw}"),
                    fingerprint: INVALID_LINE_FINGERPRINT,
                });
                None
            }
        }
    }

    /// Toggles the highlight on `line_number` and writes the fragment.
    pub fn click(&mut self, line_number: usize, total_lines: usize, navigation: &mut dyn Navigation) {
        if !(1..=total_lines).contains(&line_number) {
            return;
        }
        let fragment = if self.state == HighlightState::Highlighted(line_number) {
            self.state = HighlightState::Unhighlighted;
            None
        } else {
            self.state = HighlightState::Highlighted(line_number);
            Some(line_fragment(line_number))
        };
        debug!(target: "fragment", line = line_number, highlighted = fragment.is_some(), "line_clicked");
        if navigation.echoes_writes() {
            self.pending_echoes
                .push_back(fragment.clone().unwrap_or_default());
        }
        navigation.set_fragment(fragment.as_deref(), HistoryMode::Replace);
    }

    /// Drops a highlight that no longer fits a rebuilt document.
    pub fn revalidate(&mut self, total_lines: usize) {
        if let HighlightState::Highlighted(n) = self.state {
            if n > total_lines {
                self.state = HighlightState::Unhighlighted;
            }
        }
    }
}
