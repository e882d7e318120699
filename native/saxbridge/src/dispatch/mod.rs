//! Handler Dispatch
//!
//! Multiplexes many parser instances onto one set of native callbacks.
//!
//! ## Architecture
//!
//! ```text
//! HandlerTable ──row_of(slot)──> Arc<HandlerRow> ──┐
//!                                                  ├─> ParserContext<B> ── user_data ──> native parser
//! DispatchBridge (B) ──────────────────────────────┘
//!
//! native parser ──> trampoline::<B>(user_data, payload)
//!                     ├── entry unset: drop
//!                     └── entry set:   B::on_<kind>(slot, handler, payload)
//! ```
//!
//! ## Concurrency
//!
//! Rows are separate allocations with atomic entries. Parsers on different
//! slots never share state; registrations on a slot that is being parsed
//! take effect from the next event read, and ordering them against the parse
//! is up to the caller.

pub mod bridge;
pub mod error;
pub mod kind;
pub mod mailbox;
pub mod table;
pub mod trampoline;

pub use bridge::{Attributes, DispatchBridge};
pub use error::DispatchError;
pub use kind::{HandlerId, HandlerKind, ParserSlot};
pub use mailbox::{DispatchEvent, DispatchMessage, Mailbox};
pub use table::{HandlerRow, HandlerTable, DEFAULT_CAPACITY, MAX_CAPACITY};
pub use trampoline::ParserContext;
