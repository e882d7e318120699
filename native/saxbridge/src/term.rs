//! Elixir Term Conversion Utilities
//!
//! Converts dispatch messages to the tuples sent to the owning process:
//! `{:saxbridge, slot, handler_id, event}`.

use crate::dispatch::{DispatchEvent, DispatchMessage};
use rustler::{Encoder, Env, NewBinary, Term};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    saxbridge,
    start_tag,
    end_tag,
    character_data,
    comment,
    start_cdata,
    end_cdata,
}

/// Create a binary from bytes
pub fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

/// Convert one event payload to a term
pub fn event_to_term<'a>(env: Env<'a>, event: &DispatchEvent) -> Term<'a> {
    match event {
        DispatchEvent::StartTag { name, attributes } => {
            // Build in reverse so prepend keeps document order
            let mut attrs = Term::list_new_empty(env);
            for (k, v) in attributes.iter().rev() {
                let tuple = (bytes_to_binary(env, k), bytes_to_binary(env, v));
                attrs = attrs.list_prepend(tuple.encode(env));
            }
            (start_tag(), bytes_to_binary(env, name), attrs).encode(env)
        }
        DispatchEvent::EndTag { name } => (end_tag(), bytes_to_binary(env, name)).encode(env),
        DispatchEvent::CharacterData(data) => {
            (character_data(), bytes_to_binary(env, data)).encode(env)
        }
        DispatchEvent::Comment(text) => (comment(), bytes_to_binary(env, text)).encode(env),
        DispatchEvent::StartCdata => start_cdata().encode(env),
        DispatchEvent::EndCdata => end_cdata().encode(env),
    }
}

/// Convert a dispatch message to the tuple sent to the owner
pub fn message_to_term<'a>(env: Env<'a>, message: &DispatchMessage) -> Term<'a> {
    (
        saxbridge(),
        message.slot.index(),
        message.handler.get(),
        event_to_term(env, &message.event),
    )
        .encode(env)
}
