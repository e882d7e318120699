//! Handler Table
//!
//! Maps (parser slot, handler kind) to the handler id the caller registered.
//!
//! ## Layout
//!
//! ```text
//! HandlerTable
//!   rows[0] ──> Arc<HandlerRow { slot: 0, entries: [i32; 6] }>
//!   rows[1] ──> Arc<HandlerRow { slot: 1, entries: [i32; 6] }>
//!   ...
//! ```
//!
//! Each row is its own allocation. A parser session holds an `Arc` to its row
//! and hands the row to the native parser as context, so a trampoline can
//! recover both the slot id and every handler id from the context alone.
//! Entries are relaxed atomics: a registration racing a parse on the same
//! slot is a logical race the caller must order, never a memory hazard.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use super::error::DispatchError;
use super::kind::{HandlerId, HandlerKind, ParserSlot};

/// Default number of parser slots
pub const DEFAULT_CAPACITY: usize = 64;

/// Largest number of parser slots a table may be created with
pub const MAX_CAPACITY: usize = 65_536;

/// One parser instance's handler ids, indexed by `HandlerKind`
#[derive(Debug)]
pub struct HandlerRow {
    slot: ParserSlot,
    entries: [AtomicI32; HandlerKind::COUNT],
}

impl HandlerRow {
    /// Raw entry value meaning "no handler registered"
    pub const UNSET: i32 = -1;

    fn new(slot: ParserSlot) -> Self {
        HandlerRow {
            slot,
            entries: std::array::from_fn(|_| AtomicI32::new(Self::UNSET)),
        }
    }

    /// The slot this row belongs to
    #[inline]
    pub fn slot(&self) -> ParserSlot {
        self.slot
    }

    /// Handler registered for `kind`, or `None` if unset
    #[inline]
    pub fn handler(&self, kind: HandlerKind) -> Option<HandlerId> {
        HandlerId::from_raw(self.raw(kind))
    }

    /// Raw entry for `kind` (`UNSET` when no handler is registered)
    #[inline]
    pub fn raw(&self, kind: HandlerKind) -> i32 {
        self.entries[kind.index()].load(Ordering::Relaxed)
    }

    #[inline]
    fn store(&self, kind: HandlerKind, raw: i32) {
        self.entries[kind.index()].store(raw, Ordering::Relaxed);
    }

    fn clear_all(&self) {
        for entry in &self.entries {
            entry.store(Self::UNSET, Ordering::Relaxed);
        }
    }
}

/// Fixed-capacity registry of handler rows
#[derive(Debug)]
pub struct HandlerTable {
    rows: Box<[Arc<HandlerRow>]>,
}

impl HandlerTable {
    /// Create a table with `DEFAULT_CAPACITY` slots, all entries unset
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY)
    }

    /// Create a table with `capacity` slots, all entries unset.
    ///
    /// Capacities above `MAX_CAPACITY` are rejected before anything is
    /// allocated.
    pub fn with_capacity(capacity: usize) -> Result<Self, DispatchError> {
        if capacity > MAX_CAPACITY {
            return Err(DispatchError::CapacityOutOfRange {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        let rows = (0..capacity)
            .map(|i| Arc::new(HandlerRow::new(ParserSlot::new(i))))
            .collect();
        HandlerTable { rows }
    }

    /// Number of parser slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// Reset every entry of every slot to unset.
    ///
    /// Rows keep their identity, so sessions opened earlier observe the reset.
    pub fn reset(&self) {
        for row in self.rows.iter() {
            row.clear_all();
        }
        log::debug!("handler table reset ({} slots)", self.rows.len());
    }

    /// Register `handler` for (`slot`, `kind`)
    pub fn set_handler(
        &self,
        slot: ParserSlot,
        kind: HandlerKind,
        handler: HandlerId,
    ) -> Result<(), DispatchError> {
        self.row(slot)?.store(kind, handler.get());
        log::debug!("slot {slot}: {kind} -> handler {handler}");
        Ok(())
    }

    /// Remove the handler for (`slot`, `kind`); clearing an unset entry is fine
    pub fn clear_handler(&self, slot: ParserSlot, kind: HandlerKind) -> Result<(), DispatchError> {
        self.row(slot)?.store(kind, HandlerRow::UNSET);
        log::debug!("slot {slot}: {kind} cleared");
        Ok(())
    }

    /// Remove every handler of `slot`
    pub fn clear_slot(&self, slot: ParserSlot) -> Result<(), DispatchError> {
        self.row(slot)?.clear_all();
        log::debug!("slot {slot}: all handlers cleared");
        Ok(())
    }

    /// Handler registered for (`slot`, `kind`)
    pub fn get_handler(
        &self,
        slot: ParserSlot,
        kind: HandlerKind,
    ) -> Result<Option<HandlerId>, DispatchError> {
        Ok(self.row(slot)?.handler(kind))
    }

    /// Shared reference to `slot`'s row, used as a parser context
    pub fn row_of(&self, slot: ParserSlot) -> Result<Arc<HandlerRow>, DispatchError> {
        self.row(slot).map(Arc::clone)
    }

    fn row(&self, slot: ParserSlot) -> Result<&Arc<HandlerRow>, DispatchError> {
        self.rows
            .get(slot.index())
            .ok_or(DispatchError::SlotOutOfRange {
                slot: slot.index(),
                capacity: self.rows.len(),
            })
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(value: i64) -> HandlerId {
        HandlerId::new(value).unwrap()
    }

    fn kind_strategy() -> impl Strategy<Value = HandlerKind> {
        (0u8..HandlerKind::COUNT as u8).prop_map(|i| HandlerKind::try_from(i).unwrap())
    }

    proptest! {
        #[test]
        fn prop_fresh_table_is_unset(slot in 0usize..DEFAULT_CAPACITY, kind in kind_strategy()) {
            let table = HandlerTable::new();
            prop_assert_eq!(table.get_handler(ParserSlot::new(slot), kind), Ok(None));
        }

        #[test]
        fn prop_set_then_get_round_trips(
            slot in 0usize..DEFAULT_CAPACITY,
            kind in kind_strategy(),
            raw in 0i64..=i64::from(i32::MAX),
        ) {
            let table = HandlerTable::new();
            let slot = ParserSlot::new(slot);
            table.set_handler(slot, kind, id(raw)).unwrap();
            prop_assert_eq!(table.get_handler(slot, kind), Ok(Some(id(raw))));
        }

        #[test]
        fn prop_clear_restores_unset(
            slot in 0usize..DEFAULT_CAPACITY,
            kind in kind_strategy(),
            raw in 0i64..1000,
        ) {
            let table = HandlerTable::new();
            let slot = ParserSlot::new(slot);
            table.set_handler(slot, kind, id(raw)).unwrap();
            table.clear_handler(slot, kind).unwrap();
            prop_assert_eq!(table.get_handler(slot, kind), Ok(None));
        }

        #[test]
        fn prop_out_of_range_slot_is_rejected(
            capacity in 1usize..128,
            extra in 0usize..1000,
            kind in kind_strategy(),
        ) {
            let table = HandlerTable::with_capacity(capacity).unwrap();
            let slot = ParserSlot::new(capacity + extra);
            let expected = DispatchError::SlotOutOfRange { slot: capacity + extra, capacity };
            prop_assert_eq!(table.set_handler(slot, kind, id(1)), Err(expected.clone()));
            prop_assert_eq!(table.get_handler(slot, kind), Err(expected));
        }
    }

    #[test]
    fn test_set_touches_only_one_entry() {
        let table = HandlerTable::with_capacity(4).unwrap();
        table
            .set_handler(ParserSlot::new(2), HandlerKind::Comment, id(9))
            .unwrap();

        for slot in 0..4 {
            for kind in HandlerKind::ALL {
                let expected = (slot == 2 && kind == HandlerKind::Comment).then(|| id(9));
                assert_eq!(table.get_handler(ParserSlot::new(slot), kind), Ok(expected));
            }
        }
    }

    #[test]
    fn test_rows_know_their_slot() {
        let table = HandlerTable::with_capacity(8).unwrap();
        for i in 0..8 {
            let row = table.row_of(ParserSlot::new(i)).unwrap();
            assert_eq!(row.slot(), ParserSlot::new(i));
        }
    }

    #[test]
    fn test_row_observes_later_registrations() {
        let table = HandlerTable::new();
        let slot = ParserSlot::new(5);
        let row = table.row_of(slot).unwrap();
        assert_eq!(row.raw(HandlerKind::EndTag), HandlerRow::UNSET);

        table.set_handler(slot, HandlerKind::EndTag, id(12)).unwrap();
        assert_eq!(row.handler(HandlerKind::EndTag), Some(id(12)));

        table.reset();
        assert_eq!(row.handler(HandlerKind::EndTag), None);
    }

    #[test]
    fn test_reset_wipes_every_slot() {
        let table = HandlerTable::with_capacity(3).unwrap();
        for slot in 0..3 {
            for kind in HandlerKind::ALL {
                table
                    .set_handler(ParserSlot::new(slot), kind, id(slot as i64))
                    .unwrap();
            }
        }
        table.reset();
        for slot in 0..3 {
            for kind in HandlerKind::ALL {
                assert_eq!(table.get_handler(ParserSlot::new(slot), kind), Ok(None));
            }
        }
    }

    #[test]
    fn test_clear_slot_leaves_neighbours() {
        let table = HandlerTable::with_capacity(2).unwrap();
        for kind in HandlerKind::ALL {
            table.set_handler(ParserSlot::new(0), kind, id(1)).unwrap();
            table.set_handler(ParserSlot::new(1), kind, id(2)).unwrap();
        }
        table.clear_slot(ParserSlot::new(0)).unwrap();
        for kind in HandlerKind::ALL {
            assert_eq!(table.get_handler(ParserSlot::new(0), kind), Ok(None));
            assert_eq!(table.get_handler(ParserSlot::new(1), kind), Ok(Some(id(2))));
        }
    }

    #[test]
    fn test_out_of_range_row_and_clear() {
        let table = HandlerTable::with_capacity(2).unwrap();
        let err = DispatchError::SlotOutOfRange { slot: 2, capacity: 2 };
        assert_eq!(table.row_of(ParserSlot::new(2)).unwrap_err(), err);
        assert_eq!(
            table.clear_handler(ParserSlot::new(2), HandlerKind::StartTag),
            Err(err.clone())
        );
        assert_eq!(table.clear_slot(ParserSlot::new(2)), Err(err));
    }

    #[test]
    fn test_capacity_above_max_is_rejected() {
        assert_eq!(
            HandlerTable::with_capacity(1usize << 40).err(),
            Some(DispatchError::CapacityOutOfRange {
                requested: 1usize << 40,
                max: MAX_CAPACITY,
            })
        );
        assert!(HandlerTable::with_capacity(MAX_CAPACITY + 1).is_err());

        let table = HandlerTable::with_capacity(MAX_CAPACITY).unwrap();
        assert_eq!(table.capacity(), MAX_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_table_rejects_everything() {
        let table = HandlerTable::with_capacity(0).unwrap();
        assert_eq!(table.capacity(), 0);
        assert!(table.row_of(ParserSlot::new(0)).is_err());
    }
}
