//! Native Callback Signatures
//!
//! C-ABI handler types in the shape of a classic push parser: every callback
//! receives the parser's opaque `user_data` pointer first, followed by the
//! event payload. Strings are NUL-terminated; character data is a pointer plus
//! an explicit length and is not terminated.

use std::ffi::{c_char, c_int, c_void};

/// `(user_data, name, atts)`; `atts` is a NULL-terminated name/value array
pub type StartElementHandler =
    unsafe extern "C" fn(user_data: *mut c_void, name: *const c_char, atts: *mut *const c_char);

pub type EndElementHandler = unsafe extern "C" fn(user_data: *mut c_void, name: *const c_char);

/// `(user_data, s, len)`; `s` is not NUL-terminated
pub type CharacterDataHandler =
    unsafe extern "C" fn(user_data: *mut c_void, s: *const c_char, len: c_int);

pub type CommentHandler = unsafe extern "C" fn(user_data: *mut c_void, data: *const c_char);

pub type StartCdataSectionHandler = unsafe extern "C" fn(user_data: *mut c_void);

pub type EndCdataSectionHandler = unsafe extern "C" fn(user_data: *mut c_void);

/// The handler registration surface of a native parser.
///
/// Passing `None` removes the handler; removing an absent handler is a no-op.
pub trait CallbackSlots {
    fn set_start_element_handler(&mut self, handler: Option<StartElementHandler>);
    fn set_end_element_handler(&mut self, handler: Option<EndElementHandler>);
    fn set_character_data_handler(&mut self, handler: Option<CharacterDataHandler>);
    fn set_comment_handler(&mut self, handler: Option<CommentHandler>);
    fn set_start_cdata_section_handler(&mut self, handler: Option<StartCdataSectionHandler>);
    fn set_end_cdata_section_handler(&mut self, handler: Option<EndCdataSectionHandler>);
}

/// Handler slots of one parser instance
#[derive(Debug, Clone, Copy, Default)]
pub struct Handlers {
    pub start_element: Option<StartElementHandler>,
    pub end_element: Option<EndElementHandler>,
    pub character_data: Option<CharacterDataHandler>,
    pub comment: Option<CommentHandler>,
    pub start_cdata_section: Option<StartCdataSectionHandler>,
    pub end_cdata_section: Option<EndCdataSectionHandler>,
}

impl CallbackSlots for Handlers {
    fn set_start_element_handler(&mut self, handler: Option<StartElementHandler>) {
        self.start_element = handler;
    }

    fn set_end_element_handler(&mut self, handler: Option<EndElementHandler>) {
        self.end_element = handler;
    }

    fn set_character_data_handler(&mut self, handler: Option<CharacterDataHandler>) {
        self.character_data = handler;
    }

    fn set_comment_handler(&mut self, handler: Option<CommentHandler>) {
        self.comment = handler;
    }

    fn set_start_cdata_section_handler(&mut self, handler: Option<StartCdataSectionHandler>) {
        self.start_cdata_section = handler;
    }

    fn set_end_cdata_section_handler(&mut self, handler: Option<EndCdataSectionHandler>) {
        self.end_cdata_section = handler;
    }
}
