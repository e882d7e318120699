//! Mailbox Bridge
//!
//! A `DispatchBridge` that copies every payload into an owned message and
//! queues it in delivery order. The NIF layer drains the queue after each feed
//! and forwards the messages to the owning Elixir process.

use std::sync::{Mutex, MutexGuard};

use super::bridge::{Attributes, DispatchBridge};
use super::kind::{HandlerId, HandlerKind, ParserSlot};

/// Owned copy of one event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    StartTag {
        name: Vec<u8>,
        attributes: Vec<(Vec<u8>, Vec<u8>)>,
    },
    EndTag {
        name: Vec<u8>,
    },
    CharacterData(Vec<u8>),
    Comment(Vec<u8>),
    StartCdata,
    EndCdata,
}

impl DispatchEvent {
    pub fn kind(&self) -> HandlerKind {
        match self {
            DispatchEvent::StartTag { .. } => HandlerKind::StartTag,
            DispatchEvent::EndTag { .. } => HandlerKind::EndTag,
            DispatchEvent::CharacterData(_) => HandlerKind::CharacterData,
            DispatchEvent::Comment(_) => HandlerKind::Comment,
            DispatchEvent::StartCdata => HandlerKind::StartCdata,
            DispatchEvent::EndCdata => HandlerKind::EndCdata,
        }
    }
}

/// One resolved dispatch: which handler of which parser, with what payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMessage {
    pub slot: ParserSlot,
    pub handler: HandlerId,
    pub event: DispatchEvent,
}

/// Ordered queue of dispatch messages
#[derive(Debug, Default)]
pub struct Mailbox {
    messages: Mutex<Vec<DispatchMessage>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all queued messages, oldest first
    pub fn take(&self) -> Vec<DispatchMessage> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push(&self, slot: ParserSlot, handler: HandlerId, event: DispatchEvent) {
        log::trace!("slot {slot}: queue {} for handler {handler}", event.kind());
        self.lock().push(DispatchMessage {
            slot,
            handler,
            event,
        });
    }

    // A panic while pushing cannot leave the Vec half-written, so a poisoned
    // lock still guards a consistent queue.
    fn lock(&self) -> MutexGuard<'_, Vec<DispatchMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DispatchBridge for Mailbox {
    fn on_start_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8], attributes: Attributes<'_>) {
        self.push(
            slot,
            handler,
            DispatchEvent::StartTag {
                name: name.to_vec(),
                attributes: attributes.to_vec(),
            },
        );
    }

    fn on_end_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8]) {
        self.push(slot, handler, DispatchEvent::EndTag { name: name.to_vec() });
    }

    fn on_character_data(&self, slot: ParserSlot, handler: HandlerId, data: &[u8]) {
        self.push(slot, handler, DispatchEvent::CharacterData(data.to_vec()));
    }

    fn on_comment(&self, slot: ParserSlot, handler: HandlerId, text: &[u8]) {
        self.push(slot, handler, DispatchEvent::Comment(text.to_vec()));
    }

    fn on_start_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        self.push(slot, handler, DispatchEvent::StartCdata);
    }

    fn on_end_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        self.push(slot, handler, DispatchEvent::EndCdata);
    }
}
