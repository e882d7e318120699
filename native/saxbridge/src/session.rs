//! Parser Sessions
//!
//! Ties one native parser to one table row. The session owns the parser and
//! the heap-allocated `ParserContext` its `user_data` points at, so the
//! context is guaranteed to outlive every callback the parser can make.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::dispatch::trampoline::{self, ParserContext};
use crate::dispatch::{DispatchBridge, DispatchError, HandlerKind, HandlerRow, HandlerTable, ParserSlot};
use crate::engine::{ParseError, PushParser};

/// A push parser bound to a handler row and a bridge
pub struct ParserSession<B> {
    /// Dropped explicitly in `Drop`, before the context it points at
    parser: ManuallyDrop<PushParser>,
    /// Leaked box, reclaimed in `Drop`. Kept as a raw pointer so moving the
    /// session never invalidates the copy stored in the parser.
    context: NonNull<ParserContext<B>>,
}

// SAFETY: the only raw pointers involved are the context (owned by the
// session, moved with it) and the parser's scratch pointers, which never
// escape a `feed` call. Nothing is shared with another thread.
unsafe impl<B: Send> Send for ParserSession<B> {}

impl<B: DispatchBridge> ParserSession<B> {
    /// Create a session for `row` with no trampolines installed
    pub fn new(row: Arc<HandlerRow>, bridge: B) -> Self {
        let slot = row.slot();
        let context = NonNull::from(Box::leak(Box::new(ParserContext::new(row, bridge))));
        let mut parser = ManuallyDrop::new(PushParser::new());
        // SAFETY: the context lives until `Drop`, after the last possible
        // `feed`, and only `ParserContext<B>` trampolines are ever installed.
        unsafe { parser.set_user_data(context.as_ptr().cast::<c_void>()) };

        log::debug!("session opened on slot {slot}");
        ParserSession { parser, context }
    }

    /// Create a session for `slot` of `table`
    pub fn open(table: &HandlerTable, slot: ParserSlot, bridge: B) -> Result<Self, DispatchError> {
        Ok(Self::new(table.row_of(slot)?, bridge))
    }

    #[inline]
    fn context(&self) -> &ParserContext<B> {
        // SAFETY: valid from `new` until `Drop`; never mutably aliased.
        unsafe { self.context.as_ref() }
    }

    pub fn slot(&self) -> ParserSlot {
        self.context().slot()
    }

    pub fn bridge(&self) -> &B {
        self.context().bridge()
    }

    /// Route native `kind` events of this parser through the table
    pub fn install(&mut self, kind: HandlerKind) {
        // SAFETY: user_data is this session's ParserContext<B>.
        unsafe { trampoline::install::<B, _>(kind, &mut *self.parser) };
        log::debug!("slot {}: {kind} trampoline installed", self.slot());
    }

    /// Stop receiving native `kind` events; no-op if not installed
    pub fn uninstall(&mut self, kind: HandlerKind) {
        trampoline::uninstall(kind, &mut *self.parser);
        log::debug!("slot {}: {kind} trampoline uninstalled", self.slot());
    }

    pub fn install_all(&mut self) {
        for kind in HandlerKind::ALL {
            self.install(kind);
        }
    }

    pub fn uninstall_all(&mut self) {
        for kind in HandlerKind::ALL {
            self.uninstall(kind);
        }
    }

    /// Feed input; resolved events reach the bridge before this returns
    pub fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), ParseError> {
        self.parser.feed(chunk, is_final)
    }

    /// Start a new document on the same slot, keeping installed trampolines
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    pub fn byte_index(&self) -> u64 {
        self.parser.byte_index()
    }
}

impl<B> Drop for ParserSession<B> {
    fn drop(&mut self) {
        // SAFETY: both are released exactly once, here. The parser goes first
        // so no copy of the context pointer outlives the context.
        unsafe {
            ManuallyDrop::drop(&mut self.parser);
            drop(Box::from_raw(self.context.as_ptr()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchEvent, DispatchMessage, HandlerId, Mailbox};
    use pretty_assertions::assert_eq;

    fn id(value: i64) -> HandlerId {
        HandlerId::new(value).unwrap()
    }

    fn events(session: &ParserSession<Mailbox>) -> Vec<DispatchEvent> {
        session.bridge().take().into_iter().map(|m| m.event).collect()
    }

    #[test]
    fn test_start_tag_only_for_registered_slot() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(3);
        table.set_handler(slot, HandlerKind::StartTag, id(7)).unwrap();

        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install_all();
        session.feed(b"<a/>", true).unwrap();

        assert_eq!(
            session.bridge().take(),
            vec![DispatchMessage {
                slot,
                handler: id(7),
                event: DispatchEvent::StartTag {
                    name: b"a".to_vec(),
                    attributes: Vec::new(),
                },
            }]
        );
    }

    #[test]
    fn test_end_tag_dispatched_when_registered() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(3);
        table.set_handler(slot, HandlerKind::StartTag, id(7)).unwrap();
        table.set_handler(slot, HandlerKind::EndTag, id(8)).unwrap();

        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install_all();
        session.feed(b"<a/>", true).unwrap();

        let messages = session.bridge().take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].slot, slot);
        assert_eq!(messages[1].handler, id(8));
        assert_eq!(messages[1].event, DispatchEvent::EndTag { name: b"a".to_vec() });
    }

    #[test]
    fn test_installed_kind_dispatches_once_per_event() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(0);
        table.set_handler(slot, HandlerKind::Comment, id(1)).unwrap();

        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install(HandlerKind::Comment);
        session.feed(b"<r><!--x--></r>", true).unwrap();

        assert_eq!(events(&session), vec![DispatchEvent::Comment(b"x".to_vec())]);
    }

    #[test]
    fn test_uninstalled_kind_never_reaches_bridge() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(1);
        table.set_handler(slot, HandlerKind::CharacterData, id(2)).unwrap();

        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install(HandlerKind::CharacterData);
        session.feed(b"<r>one</r>", true).unwrap();
        assert_eq!(events(&session), vec![DispatchEvent::CharacterData(b"one".to_vec())]);

        session.uninstall(HandlerKind::CharacterData);
        session.uninstall(HandlerKind::CharacterData);
        session.reset();
        session.feed(b"<r>two</r>", true).unwrap();
        assert!(session.bridge().is_empty());
    }

    #[test]
    fn test_installed_but_unset_drops_silently() {
        let table = HandlerTable::new();
        let mut session = ParserSession::open(&table, ParserSlot::new(9), Mailbox::new()).unwrap();
        session.install_all();
        session.feed(b"<r a='1'>t<![CDATA[c]]><!--n--></r>", true).unwrap();
        assert!(session.bridge().is_empty());
    }

    #[test]
    fn test_every_kind_in_document_order() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(4);
        for (i, kind) in HandlerKind::ALL.into_iter().enumerate() {
            table.set_handler(slot, kind, id(10 + i as i64)).unwrap();
        }

        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install_all();
        session.feed(b"<r a=\"1\">t<![CDATA[c]]>", false).unwrap();
        session.feed(b"<!--n--></r>", true).unwrap();

        let messages = session.bridge().take();
        let handlers: Vec<i32> = messages.iter().map(|m| m.handler.get()).collect();
        assert_eq!(handlers, vec![10, 12, 14, 12, 15, 13, 11]);
        assert_eq!(
            messages[0].event,
            DispatchEvent::StartTag {
                name: b"r".to_vec(),
                attributes: vec![(b"a".to_vec(), b"1".to_vec())],
            }
        );
        assert!(messages.iter().all(|m| m.slot == slot));
    }

    #[test]
    fn test_registration_changes_apply_between_chunks() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(2);
        let mut session = ParserSession::open(&table, slot, Mailbox::new()).unwrap();
        session.install(HandlerKind::StartTag);

        session.feed(b"<a>", false).unwrap();
        table.set_handler(slot, HandlerKind::StartTag, id(5)).unwrap();
        session.feed(b"<b>", false).unwrap();
        table.clear_handler(slot, HandlerKind::StartTag).unwrap();
        session.feed(b"<c/></b></a>", true).unwrap();

        assert_eq!(
            events(&session),
            vec![DispatchEvent::StartTag {
                name: b"b".to_vec(),
                attributes: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_open_rejects_out_of_range_slot() {
        let table = HandlerTable::with_capacity(4).unwrap();
        let err = ParserSession::open(&table, ParserSlot::new(4), Mailbox::new())
            .err()
            .unwrap();
        assert_eq!(err, DispatchError::SlotOutOfRange { slot: 4, capacity: 4 });
    }

    #[test]
    fn test_parallel_slots_do_not_interfere() {
        let _ = env_logger::builder().is_test(true).try_init();
        let table = HandlerTable::new();
        table
            .set_handler(ParserSlot::new(0), HandlerKind::CharacterData, id(100))
            .unwrap();
        table
            .set_handler(ParserSlot::new(1), HandlerKind::CharacterData, id(200))
            .unwrap();

        let results: Vec<Vec<DispatchMessage>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|slot| {
                    let table = &table;
                    scope.spawn(move || {
                        let mut session =
                            ParserSession::open(table, ParserSlot::new(slot), Mailbox::new()).unwrap();
                        session.install_all();
                        for i in 0..50 {
                            let doc = format!("<r>{slot}-{i}</r>");
                            session.reset();
                            session.feed(doc.as_bytes(), true).unwrap();
                        }
                        session.bridge().take()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (slot, messages) in results.iter().enumerate() {
            assert_eq!(messages.len(), 50);
            for (i, message) in messages.iter().enumerate() {
                assert_eq!(message.slot, ParserSlot::new(slot));
                assert_eq!(message.handler, id(100 * (slot as i64 + 1)));
                assert_eq!(
                    message.event,
                    DispatchEvent::CharacterData(format!("{slot}-{i}").into_bytes())
                );
            }
        }
    }

    #[test]
    fn test_shared_bridge_sees_slots_interleaved() {
        let table = HandlerTable::new();
        for slot in [0, 1] {
            table
                .set_handler(ParserSlot::new(slot), HandlerKind::EndTag, id(slot as i64))
                .unwrap();
        }
        let mailbox = Arc::new(Mailbox::new());
        let mut first = ParserSession::open(&table, ParserSlot::new(0), Arc::clone(&mailbox)).unwrap();
        let mut second = ParserSession::open(&table, ParserSlot::new(1), Arc::clone(&mailbox)).unwrap();
        first.install(HandlerKind::EndTag);
        second.install(HandlerKind::EndTag);

        first.feed(b"<x/>", true).unwrap();
        second.feed(b"<y/>", true).unwrap();

        let slots: Vec<usize> = mailbox.take().iter().map(|m| m.slot.index()).collect();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn test_drop_releases_context_and_bridge() {
        let table = HandlerTable::new();
        table
            .set_handler(ParserSlot::new(0), HandlerKind::CharacterData, id(1))
            .unwrap();
        let mailbox = Arc::new(Mailbox::new());
        let row = table.row_of(ParserSlot::new(0)).unwrap();

        let mut session = ParserSession::new(Arc::clone(&row), Arc::clone(&mailbox));
        session.install_all();
        session.feed(b"<r>partial", false).unwrap();
        assert_eq!(Arc::strong_count(&mailbox), 2);
        assert_eq!(Arc::strong_count(&row), 3);

        drop(session);
        assert_eq!(Arc::strong_count(&mailbox), 1);
        assert_eq!(Arc::strong_count(&row), 2);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_session_moves_across_threads() {
        let table = HandlerTable::new();
        table
            .set_handler(ParserSlot::new(0), HandlerKind::StartTag, id(0))
            .unwrap();
        let mut session = ParserSession::open(&table, ParserSlot::new(0), Mailbox::new()).unwrap();
        session.install(HandlerKind::StartTag);

        let session = std::thread::spawn(move || {
            session.feed(b"<moved/>", true).unwrap();
            session
        })
        .join()
        .unwrap();
        assert_eq!(session.bridge().len(), 1);
    }
}
