//! SaxBridge - slot-multiplexed SAX callback dispatch
//!
//! One set of native callbacks serves many concurrent push parsers. Each
//! parser is bound to a slot of a shared handler table; its events are looked
//! up by (slot, kind) and forwarded to a `DispatchBridge` together with the
//! registered handler id.
//!
//! Layers:
//! - `engine`: callback-driven push parser with a native calling convention
//! - `dispatch`: handler table, trampolines and bridges
//! - `session`: one parser bound to one table row
//! - NIFs below: the table and sessions as Elixir resources

use rustler::{Atom, Binary, Encoder, Env, LocalPid, NifResult, ResourceArc, Term};

mod core;
pub mod dispatch;
pub mod engine;
mod resource;
pub mod session;
mod term;

use dispatch::{HandlerId, HandlerKind, Mailbox, ParserSlot};
use resource::{SessionRef, SessionResource, TableRef, TableResource};
use session::ParserSession;
use term::{message_to_term, ok};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Argument Decoding
// ============================================================================

/// Wrap any displayable error as `{:error, message}`
fn to_nif_error<E: std::fmt::Display>(err: E) -> rustler::Error {
    rustler::Error::Term(Box::new(err.to_string()))
}

/// Kinds arrive as atoms such as `:start_tag` or as column indices `0..6`
fn decode_kind(kind: Term) -> NifResult<HandlerKind> {
    let kind = if kind.is_atom() {
        kind.atom_to_string()?.parse::<HandlerKind>()
    } else {
        HandlerKind::try_from(kind.decode::<u32>()?)
    };
    kind.map_err(to_nif_error)
}

// ============================================================================
// Handler Table
// ============================================================================

/// Create a handler table with `capacity` slots, all entries unset.
/// Capacities above `MAX_CAPACITY` come back as `{:error, msg}`.
#[rustler::nif]
fn table_new(capacity: usize) -> NifResult<TableRef> {
    let resource = TableResource::new(capacity).map_err(to_nif_error)?;
    Ok(ResourceArc::new(resource))
}

/// Reset every entry of every slot to unset
#[rustler::nif]
fn table_reset(table: TableRef) -> Atom {
    table.table.reset();
    ok()
}

#[rustler::nif]
fn table_capacity(table: TableRef) -> usize {
    table.table.capacity()
}

/// Register handler `id` for (`slot`, `kind`)
#[rustler::nif]
fn set_handler(table: TableRef, slot: usize, kind: Term, id: i64) -> NifResult<Atom> {
    let kind = decode_kind(kind)?;
    let id = HandlerId::new(id).map_err(to_nif_error)?;
    table
        .table
        .set_handler(ParserSlot::new(slot), kind, id)
        .map_err(to_nif_error)?;
    Ok(ok())
}

#[rustler::nif]
fn clear_handler(table: TableRef, slot: usize, kind: Term) -> NifResult<Atom> {
    let kind = decode_kind(kind)?;
    table
        .table
        .clear_handler(ParserSlot::new(slot), kind)
        .map_err(to_nif_error)?;
    Ok(ok())
}

/// Returns `{:ok, id}` or `{:ok, nil}` when the entry is unset
#[rustler::nif]
fn get_handler<'a>(env: Env<'a>, table: TableRef, slot: usize, kind: Term<'a>) -> NifResult<Term<'a>> {
    let kind = decode_kind(kind)?;
    let handler = table
        .table
        .get_handler(ParserSlot::new(slot), kind)
        .map_err(to_nif_error)?;
    Ok((ok(), handler.map(HandlerId::get)).encode(env))
}

#[rustler::nif]
fn clear_slot(table: TableRef, slot: usize) -> NifResult<Atom> {
    table
        .table
        .clear_slot(ParserSlot::new(slot))
        .map_err(to_nif_error)?;
    Ok(ok())
}

// ============================================================================
// Parser Sessions
// ============================================================================

/// Open a parser on `slot`; dispatch messages go to `owner`
#[rustler::nif]
fn session_new(table: TableRef, slot: usize, owner: LocalPid) -> NifResult<SessionRef> {
    let session = ParserSession::open(&table.table, ParserSlot::new(slot), Mailbox::new())
        .map_err(to_nif_error)?;
    Ok(ResourceArc::new(SessionResource::new(session, owner)))
}

#[rustler::nif]
fn session_install(session: SessionRef, kind: Term) -> NifResult<Atom> {
    let kind = decode_kind(kind)?;
    session.lock().map_err(to_nif_error)?.install(kind);
    Ok(ok())
}

#[rustler::nif]
fn session_uninstall(session: SessionRef, kind: Term) -> NifResult<Atom> {
    let kind = decode_kind(kind)?;
    session.lock().map_err(to_nif_error)?.uninstall(kind);
    Ok(ok())
}

/// Feed a chunk and deliver the resulting messages to the session owner.
///
/// Messages produced before a parse error are still delivered. Returns
/// `{:ok, byte_index}`.
#[rustler::nif(schedule = "DirtyCpu")]
fn session_feed<'a>(
    env: Env<'a>,
    session: SessionRef,
    chunk: Binary<'a>,
    is_final: bool,
) -> NifResult<Term<'a>> {
    let (result, messages, byte_index) = {
        let mut inner = session.lock().map_err(to_nif_error)?;
        let result = inner.feed(chunk.as_slice(), is_final);
        (result, inner.bridge().take(), inner.byte_index())
    };

    for message in &messages {
        if env.send(&session.owner, message_to_term(env, message)).is_err() {
            log::warn!(
                "slot {}: dropped {} message, owner is not alive",
                message.slot,
                message.event.kind()
            );
        }
    }

    result.map_err(to_nif_error)?;
    Ok((ok(), byte_index).encode(env))
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.SaxBridge.Native");
