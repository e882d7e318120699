//! ResourceArc Wrappers
//!
//! Persistent state handed to Elixir: the handler table and parser sessions.

use crate::dispatch::{DispatchError, HandlerTable, Mailbox};
use crate::session::ParserSession;
use rustler::{LocalPid, ResourceArc};
use std::sync::{Mutex, MutexGuard};

/// Wrapper for HandlerTable that can be stored in a ResourceArc.
/// Rows are atomic, so no lock is needed.
pub struct TableResource {
    pub table: HandlerTable,
}

impl TableResource {
    pub fn new(capacity: usize) -> Result<Self, DispatchError> {
        Ok(TableResource {
            table: HandlerTable::with_capacity(capacity)?,
        })
    }
}

#[rustler::resource_impl]
impl rustler::Resource for TableResource {}

/// Type alias for the table ResourceArc
pub type TableRef = ResourceArc<TableResource>;

/// A parser session plus the process its dispatch messages go to
pub struct SessionResource {
    pub inner: Mutex<ParserSession<Mailbox>>,
    pub owner: LocalPid,
}

impl SessionResource {
    pub fn new(session: ParserSession<Mailbox>, owner: LocalPid) -> Self {
        SessionResource {
            inner: Mutex::new(session),
            owner,
        }
    }

    /// Lock the session.
    ///
    /// # Errors
    ///
    /// Returns `"mutex_poisoned"` if a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, ParserSession<Mailbox>>, &'static str> {
        self.inner.lock().map_err(|_| "mutex_poisoned")
    }
}

#[rustler::resource_impl]
impl rustler::Resource for SessionResource {}

/// Type alias for session ResourceArc
pub type SessionRef = ResourceArc<SessionResource>;
