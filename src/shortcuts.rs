//! Global keyboard shortcuts.
//!
//! A [`KeyboardHub`] is the single process-wide key event source. A view
//! mounts one [`ShortcutSet`] on it and gets back a [`MountGuard`]; dropping
//! the guard removes the listener again.
//!
//! Matching rules for one event:
//! - the key label compares case-insensitively,
//! - a modifier left unspecified on the chord matches either state,
//! - a specified modifier must equal the event's state.
//!
//! Shortcuts are tried in registration order and the first match wins, even
//! when a later shortcut is more specific. A match prevents the event's
//! default handling and runs exactly one action; no match leaves the event
//! untouched.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::logging::{log, obj, v_num, v_str, Domain, Level};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    default_prevented: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self, on: bool) -> Self {
        self.ctrl = on;
        self
    }

    pub fn with_alt(mut self, on: bool) -> Self {
        self.alt = on;
        self
    }

    pub fn with_shift(mut self, on: bool) -> Self {
        self.shift = on;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// A key label plus optional modifier requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub key: String,
    #[serde(default)]
    pub ctrl: Option<bool>,
    #[serde(default)]
    pub alt: Option<bool>,
    #[serde(default)]
    pub shift: Option<bool>,
}

fn flag_matches(want: Option<bool>, actual: bool) -> bool {
    want.map_or(true, |w| w == actual)
}

// Two requirements can be met by one event unless both are set and differ.
fn flags_compatible(a: Option<bool>, b: Option<bool>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

impl Chord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: None,
            alt: None,
            shift: None,
        }
    }

    pub fn ctrl(mut self, on: bool) -> Self {
        self.ctrl = Some(on);
        self
    }

    pub fn alt(mut self, on: bool) -> Self {
        self.alt = Some(on);
        self
    }

    pub fn shift(mut self, on: bool) -> Self {
        self.shift = Some(on);
        self
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.key.to_lowercase() == self.key.to_lowercase()
            && flag_matches(self.ctrl, event.ctrl)
            && flag_matches(self.alt, event.alt)
            && flag_matches(self.shift, event.shift)
    }

    /// True when some event would match both chords.
    pub fn overlaps(&self, other: &Chord) -> bool {
        self.key.to_lowercase() == other.key.to_lowercase()
            && flags_compatible(self.ctrl, other.ctrl)
            && flags_compatible(self.alt, other.alt)
            && flags_compatible(self.shift, other.shift)
    }
}

impl fmt::Display for Chord {
    /// Required modifiers only, e.g. `Ctrl+Alt+H`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [(self.ctrl, "Ctrl"), (self.alt, "Alt"), (self.shift, "Shift")] {
            if flag == Some(true) {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key.to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortcut<A> {
    pub chord: Chord,
    pub action: A,
    pub description: String,
}

impl<A> Shortcut<A> {
    pub fn new(chord: Chord, action: A, description: impl Into<String>) -> Self {
        Self {
            chord,
            action,
            description: description.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortcutError {
    #[error("shortcut {index} has no key label")]
    MissingKey { index: usize },
    #[error("shortcut {index} key label {key:?} has surrounding whitespace")]
    PaddedKey { index: usize, key: String },
}

/// Registered shortcuts in registration order.
#[derive(Debug, Clone)]
pub struct ShortcutSet<A> {
    shortcuts: Vec<Shortcut<A>>,
}

impl<A> ShortcutSet<A> {
    /// Rejects blank or padded key labels. Overlapping chords are accepted and logged;
    /// the earlier registration wins at dispatch time.
    pub fn new(shortcuts: Vec<Shortcut<A>>) -> Result<Self, ShortcutError> {
        for (index, s) in shortcuts.iter().enumerate() {
            let key = s.chord.key.as_str();
            if key.trim().is_empty() {
                return Err(ShortcutError::MissingKey { index });
            }
            if key.trim() != key {
                return Err(ShortcutError::PaddedKey {
                    index,
                    key: key.to_string(),
                });
            }
        }
        let set = Self { shortcuts };
        for (first, second) in set.overlaps() {
            log(
                Level::Warn,
                Domain::Shortcuts,
                "overlap",
                obj(&[
                    ("msg", v_str("later shortcut is shadowed for some events")),
                    ("first", v_str(&set.shortcuts[first].chord.to_string())),
                    ("second", v_str(&set.shortcuts[second].chord.to_string())),
                ]),
            );
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shortcut<A>> {
        self.shortcuts.iter()
    }

    /// Index pairs `(earlier, later)` whose chords can match the same event.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (i, a) in self.shortcuts.iter().enumerate() {
            for (j, b) in self.shortcuts.iter().enumerate().skip(i + 1) {
                if a.chord.overlaps(&b.chord) {
                    out.push((i, j));
                }
            }
        }
        out
    }

    pub fn find(&self, event: &KeyEvent) -> Option<&Shortcut<A>> {
        self.shortcuts.iter().find(|s| s.chord.matches(event))
    }

    /// First matching shortcut's action; marks the event handled on a match.
    pub fn dispatch(&self, event: &mut KeyEvent) -> Option<&A> {
        let hit = self.find(event)?;
        event.prevent_default();
        Some(&hit.action)
    }

    /// `(chord label, description)` rows for a help overlay.
    pub fn help_lines(&self) -> Vec<(String, &str)> {
        self.shortcuts
            .iter()
            .map(|s| (s.chord.to_string(), s.description.as_str()))
            .collect()
    }
}

// =============================================================================
// Event source and mounting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<RefCell<dyn FnMut(&mut KeyEvent)>>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Process-wide key event source. Cloning yields another handle to the same
/// listener list. Single-threaded: events are delivered one at a time.
#[derive(Clone, Default)]
pub struct KeyboardHub {
    inner: Rc<RefCell<HubInner>>,
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&mut KeyEvent) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        let listener: Listener = Rc::new(RefCell::new(handler));
        inner.listeners.push((id, listener));
        id
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Delivers the event to every listener in install order and hands it
    /// back so callers can inspect `default_prevented`.
    pub fn emit(&self, mut event: KeyEvent) -> KeyEvent {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            // A listener that emits from inside its own handler does not see
            // the nested event.
            if let Ok(mut handler) = listener.try_borrow_mut() {
                (*handler)(&mut event);
            }
        }
        event
    }
}

impl fmt::Debug for KeyboardHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps one mounted shortcut listener alive. Dropping it unmounts.
#[derive(Debug)]
pub struct MountGuard {
    hub: KeyboardHub,
    id: ListenerId,
}

impl MountGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unmount(self) {}
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        let removed = self.hub.unlisten(self.id);
        log(
            Level::Debug,
            Domain::Shortcuts,
            "unmount",
            obj(&[
                ("listener", v_num(self.id.0 as f64)),
                ("removed", serde_json::Value::Bool(removed)),
            ]),
        );
    }
}

/// Installs a single listener that dispatches `set` and passes each matched
/// action to `on_action`.
pub fn mount<A, F>(hub: &KeyboardHub, set: ShortcutSet<A>, mut on_action: F) -> MountGuard
where
    A: 'static,
    F: FnMut(&A) + 'static,
{
    let count = set.len();
    let id = hub.listen(move |event| {
        if let Some(action) = set.dispatch(event) {
            on_action(action);
        }
    });
    log(
        Level::Debug,
        Domain::Shortcuts,
        "mount",
        obj(&[("listener", v_num(id.0 as f64)), ("shortcuts", v_num(count as f64))]),
    );
    MountGuard {
        hub: hub.clone(),
        id,
    }
}

/// Owner-side slot that holds at most one mounted listener. Mounting again
/// releases the previous listener first.
#[derive(Debug)]
pub struct ShortcutScope {
    hub: KeyboardHub,
    guard: Option<MountGuard>,
}

impl ShortcutScope {
    pub fn new(hub: &KeyboardHub) -> Self {
        Self {
            hub: hub.clone(),
            guard: None,
        }
    }

    pub fn mount<A, F>(&mut self, set: ShortcutSet<A>, on_action: F)
    where
        A: 'static,
        F: FnMut(&A) + 'static,
    {
        self.guard = None;
        self.guard = Some(mount(&self.hub, set, on_action));
    }

    pub fn unmount(&mut self) {
        self.guard = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.guard.is_some()
    }
}

// =============================================================================
// Application navigation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Bookmarks,
    WarRoom,
    Production,
    Help,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Bookmarks => "/bookmarks",
            Route::WarRoom => "/war-room",
            Route::Production => "/production",
            Route::Help => "/help",
        }
    }
}

/// The dashboard shell's navigation chords.
pub fn navigation_shortcuts() -> Result<ShortcutSet<Route>, ShortcutError> {
    ShortcutSet::new(vec![
        Shortcut::new(Chord::new("h").alt(true), Route::Home, "Go to dashboard home"),
        Shortcut::new(Chord::new("b").alt(true), Route::Bookmarks, "Go to market bookmarks"),
        Shortcut::new(Chord::new("w").alt(true), Route::WarRoom, "Go to war room"),
        Shortcut::new(Chord::new("p").alt(true), Route::Production, "Go to production planning"),
        Shortcut::new(Chord::new("?").ctrl(false).alt(false), Route::Help, "Show keyboard shortcuts"),
    ])
}
