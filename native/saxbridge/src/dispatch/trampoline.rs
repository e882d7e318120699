//! Trampolines
//!
//! One fixed-signature native callback per handler kind. The native parser
//! only gives us its opaque `user_data`, which always points at a
//! `ParserContext`: the table row of the parser's slot plus the bridge.
//!
//! ```text
//! native parser ──(user_data, payload)──> start_tag::<B>
//!                                            │ row.handler(StartTag)
//!                                            ├── unset: return
//!                                            └── set:   bridge.on_start_tag(slot, id, ...)
//! ```
//!
//! Trampolines are generic over the bridge type, so each bridge gets its own
//! monomorphized set of `extern "C"` entry points and no dynamic dispatch.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::bridge::{Attributes, DispatchBridge};
use super::kind::{HandlerId, HandlerKind, ParserSlot};
use super::table::HandlerRow;
use crate::engine::CallbackSlots;

/// The object a native parser's `user_data` points at
pub struct ParserContext<B> {
    row: Arc<HandlerRow>,
    bridge: B,
}

impl<B: DispatchBridge> ParserContext<B> {
    pub fn new(row: Arc<HandlerRow>, bridge: B) -> Self {
        ParserContext { row, bridge }
    }

    #[inline]
    pub fn slot(&self) -> ParserSlot {
        self.row.slot()
    }

    #[inline]
    pub fn row(&self) -> &HandlerRow {
        &self.row
    }

    #[inline]
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// # Safety
    /// `user_data` must be null or point to a live `ParserContext<B>`.
    #[inline]
    unsafe fn from_user_data<'a>(user_data: *mut c_void) -> Option<&'a Self> {
        (user_data as *const Self).as_ref()
    }

    /// Resolve the handler for `kind` and run `call` with it.
    ///
    /// Unset entries drop the event. A panicking bridge is contained here so
    /// it never unwinds into the native parser.
    #[inline]
    fn forward<F>(&self, kind: HandlerKind, call: F)
    where
        F: FnOnce(&B, ParserSlot, HandlerId),
    {
        let Some(handler) = self.row.handler(kind) else {
            return;
        };
        let slot = self.row.slot();
        log::trace!("slot {slot}: dispatch {kind} to handler {handler}");

        if panic::catch_unwind(AssertUnwindSafe(|| call(&self.bridge, slot, handler))).is_err() {
            log::error!("slot {slot}: bridge panicked in {kind} handler {handler}, event dropped");
        }
    }
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string that outlives `'a`.
#[inline]
unsafe fn c_bytes<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        &[]
    } else {
        CStr::from_ptr(ptr).to_bytes()
    }
}

pub unsafe extern "C" fn start_tag<B: DispatchBridge>(
    user_data: *mut c_void,
    name: *const c_char,
    atts: *mut *const c_char,
) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::StartTag, |bridge, slot, handler| {
        let attributes = Attributes::from_raw(atts.cast_const());
        bridge.on_start_tag(slot, handler, c_bytes(name), attributes);
    });
}

pub unsafe extern "C" fn end_tag<B: DispatchBridge>(user_data: *mut c_void, name: *const c_char) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::EndTag, |bridge, slot, handler| {
        bridge.on_end_tag(slot, handler, c_bytes(name));
    });
}

pub unsafe extern "C" fn character_data<B: DispatchBridge>(
    user_data: *mut c_void,
    s: *const c_char,
    len: c_int,
) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::CharacterData, |bridge, slot, handler| {
        let data = match usize::try_from(len) {
            Ok(len) if !s.is_null() => std::slice::from_raw_parts(s.cast::<u8>(), len),
            _ => &[],
        };
        bridge.on_character_data(slot, handler, data);
    });
}

pub unsafe extern "C" fn comment<B: DispatchBridge>(user_data: *mut c_void, data: *const c_char) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::Comment, |bridge, slot, handler| {
        bridge.on_comment(slot, handler, c_bytes(data));
    });
}

pub unsafe extern "C" fn start_cdata<B: DispatchBridge>(user_data: *mut c_void) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::StartCdata, |bridge, slot, handler| {
        bridge.on_start_cdata(slot, handler);
    });
}

pub unsafe extern "C" fn end_cdata<B: DispatchBridge>(user_data: *mut c_void) {
    let Some(ctx) = ParserContext::<B>::from_user_data(user_data) else {
        return;
    };
    ctx.forward(HandlerKind::EndCdata, |bridge, slot, handler| {
        bridge.on_end_cdata(slot, handler);
    });
}

/// Bind `kind`'s trampoline as the native callback of `parser`.
///
/// # Safety
/// Whenever `parser` invokes the callback, its `user_data` must be null or
/// point to a live `ParserContext<B>`.
pub unsafe fn install<B, P>(kind: HandlerKind, parser: &mut P)
where
    B: DispatchBridge,
    P: CallbackSlots + ?Sized,
{
    match kind {
        HandlerKind::StartTag => parser.set_start_element_handler(Some(start_tag::<B>)),
        HandlerKind::EndTag => parser.set_end_element_handler(Some(end_tag::<B>)),
        HandlerKind::CharacterData => {
            parser.set_character_data_handler(Some(character_data::<B>))
        }
        HandlerKind::Comment => parser.set_comment_handler(Some(comment::<B>)),
        HandlerKind::StartCdata => {
            parser.set_start_cdata_section_handler(Some(start_cdata::<B>))
        }
        HandlerKind::EndCdata => parser.set_end_cdata_section_handler(Some(end_cdata::<B>)),
    }
}

/// Remove `kind`'s native callback from `parser`; idempotent
pub fn uninstall<P>(kind: HandlerKind, parser: &mut P)
where
    P: CallbackSlots + ?Sized,
{
    match kind {
        HandlerKind::StartTag => parser.set_start_element_handler(None),
        HandlerKind::EndTag => parser.set_end_element_handler(None),
        HandlerKind::CharacterData => parser.set_character_data_handler(None),
        HandlerKind::Comment => parser.set_comment_handler(None),
        HandlerKind::StartCdata => parser.set_start_cdata_section_handler(None),
        HandlerKind::EndCdata => parser.set_end_cdata_section_handler(None),
    }
}
