//! Dispatch Bridge
//!
//! The caller-side collaborator the trampolines forward resolved events to.
//! Every payload borrows memory owned by the native parser and is only valid
//! for the duration of the call; implementations copy what they keep.

use std::ffi::{c_char, CStr};
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

use super::kind::{HandlerId, ParserSlot};

/// Receives one call per resolved native event.
///
/// Calls arrive synchronously from inside the native parse step, in document
/// order, so implementations must return promptly and must not block.
pub trait DispatchBridge {
    fn on_start_tag(
        &self,
        slot: ParserSlot,
        handler: HandlerId,
        name: &[u8],
        attributes: Attributes<'_>,
    );

    fn on_end_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8]);

    /// `data` is exactly the buffer + length the native parser reported
    fn on_character_data(&self, slot: ParserSlot, handler: HandlerId, data: &[u8]);

    fn on_comment(&self, slot: ParserSlot, handler: HandlerId, text: &[u8]);

    fn on_start_cdata(&self, slot: ParserSlot, handler: HandlerId);

    fn on_end_cdata(&self, slot: ParserSlot, handler: HandlerId);
}

impl<B: DispatchBridge + ?Sized> DispatchBridge for &B {
    fn on_start_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8], attributes: Attributes<'_>) {
        (**self).on_start_tag(slot, handler, name, attributes)
    }

    fn on_end_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8]) {
        (**self).on_end_tag(slot, handler, name)
    }

    fn on_character_data(&self, slot: ParserSlot, handler: HandlerId, data: &[u8]) {
        (**self).on_character_data(slot, handler, data)
    }

    fn on_comment(&self, slot: ParserSlot, handler: HandlerId, text: &[u8]) {
        (**self).on_comment(slot, handler, text)
    }

    fn on_start_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        (**self).on_start_cdata(slot, handler)
    }

    fn on_end_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        (**self).on_end_cdata(slot, handler)
    }
}

impl<B: DispatchBridge + ?Sized> DispatchBridge for Arc<B> {
    fn on_start_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8], attributes: Attributes<'_>) {
        (**self).on_start_tag(slot, handler, name, attributes)
    }

    fn on_end_tag(&self, slot: ParserSlot, handler: HandlerId, name: &[u8]) {
        (**self).on_end_tag(slot, handler, name)
    }

    fn on_character_data(&self, slot: ParserSlot, handler: HandlerId, data: &[u8]) {
        (**self).on_character_data(slot, handler, data)
    }

    fn on_comment(&self, slot: ParserSlot, handler: HandlerId, text: &[u8]) {
        (**self).on_comment(slot, handler, text)
    }

    fn on_start_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        (**self).on_start_cdata(slot, handler)
    }

    fn on_end_cdata(&self, slot: ParserSlot, handler: HandlerId) {
        (**self).on_end_cdata(slot, handler)
    }
}

/// Borrowed view of a native attribute array.
///
/// The native layout is a NULL-terminated array of C strings alternating
/// name, value, name, value. Iteration yields `(name, value)` pairs in
/// document order.
#[derive(Clone, Copy)]
pub struct Attributes<'a> {
    cursor: *const *const c_char,
    _marker: PhantomData<&'a CStr>,
}

impl<'a> Attributes<'a> {
    /// Wrap a native attribute array.
    ///
    /// # Safety
    /// `atts` must be null or point to a NULL-terminated array with an even
    /// number of valid NUL-terminated strings before the terminator, all
    /// alive and unmodified for `'a`.
    pub unsafe fn from_raw(atts: *const *const c_char) -> Self {
        Attributes {
            cursor: atts,
            _marker: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        // SAFETY: a non-null cursor points into a NULL-terminated array.
        self.cursor.is_null() || unsafe { (*self.cursor).is_null() }
    }

    /// Copy every pair into owned buffers
    pub fn to_vec(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map(|(name, value)| (name.to_vec(), value.to_vec()))
            .collect()
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: guaranteed by `from_raw`: the name at the cursor is followed
        // by its value, and both outlive 'a.
        unsafe {
            let name = CStr::from_ptr(*self.cursor);
            let value_ptr = *self.cursor.add(1);
            if value_ptr.is_null() {
                self.cursor = ptr::null();
                return None;
            }
            let value = CStr::from_ptr(value_ptr);
            self.cursor = self.cursor.add(2);
            Some((name.to_bytes(), value.to_bytes()))
        }
    }
}

impl std::fmt::Debug for Attributes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.map(|(n, v)| {
                (String::from_utf8_lossy(n), String::from_utf8_lossy(v))
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn native_array(strings: &[CString]) -> Vec<*const c_char> {
        let mut array: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        array.push(ptr::null());
        array
    }

    #[test]
    fn test_empty_attributes() {
        let array = native_array(&[]);
        let attrs = unsafe { Attributes::from_raw(array.as_ptr()) };
        assert!(attrs.is_empty());
        assert!(attrs.to_vec().is_empty());
    }

    #[test]
    fn test_pairs_in_order() {
        let strings = [
            CString::new("id").unwrap(),
            CString::new("1").unwrap(),
            CString::new("name").unwrap(),
            CString::new("test").unwrap(),
        ];
        let array = native_array(&strings);
        let attrs = unsafe { Attributes::from_raw(array.as_ptr()) };

        assert!(!attrs.is_empty());
        assert_eq!(
            attrs.to_vec(),
            vec![
                (b"id".to_vec(), b"1".to_vec()),
                (b"name".to_vec(), b"test".to_vec()),
            ]
        );
        // Copy semantics: iterating a copy leaves the original untouched
        assert_eq!(attrs.count(), 2);
        assert_eq!(attrs.count(), 2);
    }

    #[test]
    fn test_dangling_name_without_value_stops() {
        let strings = [CString::new("orphan").unwrap()];
        let array = native_array(&strings);
        let attrs = unsafe { Attributes::from_raw(array.as_ptr()) };
        assert_eq!(attrs.count(), 0);
    }
}
