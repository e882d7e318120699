//! Registration errors

use thiserror::Error;

/// Validation failures of the registration API.
///
/// All of these surface from the call that made the bad request; none is ever
/// raised while a trampoline runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("parser slot {slot} out of range (table capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },

    #[error("table capacity {requested} exceeds the maximum of {max} slots")]
    CapacityOutOfRange { requested: usize, max: usize },

    #[error("handler kind {0} out of range (expected 0..6)")]
    KindOutOfRange(u32),

    #[error("unknown handler kind `{0}`")]
    UnknownKind(String),

    #[error("invalid handler id {0} (expected 0..=2147483647)")]
    InvalidHandlerId(i64),
}
