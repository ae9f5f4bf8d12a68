//! Engine events and the subscriber table.
//!
//! The engine never performs I/O; everything a collaborator needs — bytes to
//! send upstream, title changes, dirty rows — arrives as an [`Event`].
//! Delivery is synchronous and in production order. Subscribers register per
//! [`EventKind`]; within a kind they are called in subscription order.

use std::collections::HashMap;
use std::fmt;

use crate::input::{Key, Modifiers};

/// Everything the engine reports to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Bytes to send to the remote application.
    Data(Vec<u8>),
    /// Bytes produced by the keyboard translator (also delivered as `Data`).
    Key(Vec<u8>),
    /// A key the translator had no mapping for.
    UnknownKey { key: Key, modifiers: Modifiers },
    /// OSC 0/1/2 window title.
    Title(String),
    /// BEL.
    Bell,
    /// Rows `[start, end]` of the viewport changed outside the write path.
    RowsDirty { start: u16, end: u16 },
    /// Coalesced refresh request for rows `[start, end]`.
    Refresh { start: u16, end: u16 },
    /// The user scrolled the view; `position` is the new display offset.
    ManualScroll { position: usize, at_bottom: bool },
    /// Application mode opened (cookie already verified).
    AppModeStart(Vec<String>),
    /// Application mode payload bytes.
    AppModeData(Vec<u8>),
    /// Application mode closed.
    AppModeEnd,
}

/// Discriminant used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Key,
    UnknownKey,
    Title,
    Bell,
    RowsDirty,
    Refresh,
    ManualScroll,
    AppModeStart,
    AppModeData,
    AppModeEnd,
}

impl Event {
    /// The subscription key this event is delivered under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Data(_) => EventKind::Data,
            Event::Key(_) => EventKind::Key,
            Event::UnknownKey { .. } => EventKind::UnknownKey,
            Event::Title(_) => EventKind::Title,
            Event::Bell => EventKind::Bell,
            Event::RowsDirty { .. } => EventKind::RowsDirty,
            Event::Refresh { .. } => EventKind::Refresh,
            Event::ManualScroll { .. } => EventKind::ManualScroll,
            Event::AppModeStart(_) => EventKind::AppModeStart,
            Event::AppModeData(_) => EventKind::AppModeData,
            Event::AppModeEnd => EventKind::AppModeEnd,
        }
    }
}

/// Handle returned by [`Emitter::subscribe`]; pass to `unsubscribe`.
pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&Event)>;

/// Subscription table keyed by event kind.
#[derive(Default)]
pub struct Emitter {
    next_id: ListenerId,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
}

impl Emitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&Event) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an event to its kind's subscribers, in subscription order.
    pub fn emit(&mut self, event: &Event) {
        if let Some(list) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in list.iter_mut() {
                listener(event);
            }
        }
    }

    /// Drop every subscriber (used by `destroy`).
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Number of registered listeners across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.len())
            .finish()
    }
}
