//! Push Parser
//!
//! A callback-driven XML push parser with a native calling convention:
//! handlers are `extern "C"` function pointers and every call receives the
//! parser's opaque `user_data` pointer.
//!
//! ```text
//! feed(chunk) ──> buffer ──> Lexer ──> Emitter ──> handler(user_data, ...)
//!                   ^                     │
//!                   └── incomplete tail ──┘ (kept for the next chunk)
//! ```
//!
//! The parser is lenient and does not validate: it reports what it can
//! tokenize and only fails when the final chunk ends inside markup.

use std::ffi::{c_char, c_int, c_void};
use std::ptr;

use memchr::memchr;
use thiserror::Error;

use super::callbacks::{
    CallbackSlots, CharacterDataHandler, CommentHandler, EndCdataSectionHandler, EndElementHandler,
    Handlers, StartCdataSectionHandler, StartElementHandler,
};
use super::lexer::{Attribute, Lexer, Step, Token};
use crate::core::entities::decode_text;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parser already received its final chunk")]
    Finished,

    #[error("input ended inside unclosed markup at byte {offset}")]
    UnclosedMarkup { offset: u64 },
}

/// Stateful push parser
pub struct PushParser {
    /// Unconsumed input (an incomplete construct carried between chunks)
    buffer: Vec<u8>,
    handlers: Handlers,
    user_data: *mut c_void,
    /// Scratch space for NUL-terminated strings handed to callbacks
    strings: CStrings,
    /// Current element depth
    depth: usize,
    /// Absolute offset of `buffer[0]` in the document
    consumed: u64,
    finished: bool,
}

impl PushParser {
    pub fn new() -> Self {
        PushParser {
            buffer: Vec::with_capacity(8192),
            handlers: Handlers::default(),
            user_data: ptr::null_mut(),
            strings: CStrings::default(),
            depth: 0,
            consumed: 0,
            finished: false,
        }
    }

    /// Set the pointer passed as first argument to every callback.
    ///
    /// # Safety
    /// Every handler installed while this pointer is set must accept it, and
    /// the pointee must stay valid for as long as `feed` may be called.
    pub unsafe fn set_user_data(&mut self, user_data: *mut c_void) {
        self.user_data = user_data;
    }

    pub fn user_data(&self) -> *mut c_void {
        self.user_data
    }

    /// Absolute offset of the first byte not yet turned into events
    pub fn byte_index(&self) -> u64 {
        self.consumed
    }

    /// Number of bytes buffered for an incomplete construct
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Forget all document state so a new document can be fed.
    ///
    /// Handlers and `user_data` stay installed.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.depth = 0;
        self.consumed = 0;
        self.finished = false;
    }

    /// Feed a chunk of input, invoking handlers for every complete construct
    pub fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), ParseError> {
        if self.finished {
            return Err(ParseError::Finished);
        }
        self.buffer.extend_from_slice(chunk);

        let PushParser {
            buffer,
            handlers,
            user_data,
            strings,
            depth,
            ..
        } = &mut *self;

        let mut emitter = Emitter {
            handlers,
            user_data: *user_data,
            strings,
            depth,
        };
        let mut lexer = Lexer::new(buffer.as_slice(), is_final);
        let mut attrs: Vec<Attribute<'_>> = Vec::with_capacity(8);

        while let Step::Token(token) = lexer.next_token(&mut attrs) {
            emitter.emit(token, &attrs);
        }
        let used = lexer.position();

        self.buffer.drain(..used);
        self.consumed += used as u64;

        if is_final {
            self.finished = true;
            if !self.buffer.is_empty() {
                return Err(ParseError::UnclosedMarkup {
                    offset: self.consumed,
                });
            }
        }
        Ok(())
    }
}

impl Default for PushParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackSlots for PushParser {
    fn set_start_element_handler(&mut self, handler: Option<StartElementHandler>) {
        self.handlers.set_start_element_handler(handler);
    }

    fn set_end_element_handler(&mut self, handler: Option<EndElementHandler>) {
        self.handlers.set_end_element_handler(handler);
    }

    fn set_character_data_handler(&mut self, handler: Option<CharacterDataHandler>) {
        self.handlers.set_character_data_handler(handler);
    }

    fn set_comment_handler(&mut self, handler: Option<CommentHandler>) {
        self.handlers.set_comment_handler(handler);
    }

    fn set_start_cdata_section_handler(&mut self, handler: Option<StartCdataSectionHandler>) {
        self.handlers.set_start_cdata_section_handler(handler);
    }

    fn set_end_cdata_section_handler(&mut self, handler: Option<EndCdataSectionHandler>) {
        self.handlers.set_end_cdata_section_handler(handler);
    }
}

/// Turns tokens into handler calls.
///
/// SAFETY (all calls below): `user_data` was accepted by `set_user_data`,
/// whose contract covers every installed handler; string arguments point into
/// `strings` or the input buffer, both alive until the handler returns.
struct Emitter<'p> {
    handlers: &'p Handlers,
    user_data: *mut c_void,
    strings: &'p mut CStrings,
    depth: &'p mut usize,
}

impl Emitter<'_> {
    fn emit(&mut self, token: Token<'_>, attrs: &[Attribute<'_>]) {
        match token {
            Token::StartTag { name, empty } => {
                *self.depth += 1;
                self.start_element(name, attrs);
                if empty {
                    self.end_element(name);
                }
            }
            Token::EndTag { name } => self.end_element(name),
            Token::Text(raw) => {
                // Character data outside the root element is not reported
                if *self.depth > 0 {
                    self.character_data(&decode_text(raw));
                }
            }
            Token::CData(content) => {
                if let Some(handler) = self.handlers.start_cdata_section {
                    unsafe { handler(self.user_data) };
                }
                self.character_data(content);
                if let Some(handler) = self.handlers.end_cdata_section {
                    unsafe { handler(self.user_data) };
                }
            }
            Token::Comment(content) => {
                if let Some(handler) = self.handlers.comment {
                    let text = self.strings.single(content);
                    unsafe { handler(self.user_data, text) };
                }
            }
            Token::Ignored(_) => {}
        }
    }

    fn start_element(&mut self, name: &[u8], attrs: &[Attribute<'_>]) {
        let Some(handler) = self.handlers.start_element else {
            return;
        };
        self.strings.clear();
        self.strings.push(name);
        for (attr_name, raw_value) in attrs {
            self.strings.push(attr_name);
            self.strings.push(&decode_text(raw_value));
        }
        if let Some((name, atts)) = self.strings.pointers().split_first_mut() {
            unsafe { handler(self.user_data, *name, atts.as_mut_ptr()) };
        }
    }

    fn end_element(&mut self, name: &[u8]) {
        *self.depth = self.depth.saturating_sub(1);
        if let Some(handler) = self.handlers.end_element {
            let name = self.strings.single(name);
            unsafe { handler(self.user_data, name) };
        }
    }

    fn character_data(&mut self, data: &[u8]) {
        let Some(handler) = self.handlers.character_data else {
            return;
        };
        for piece in data.chunks(c_int::MAX as usize) {
            unsafe { handler(self.user_data, piece.as_ptr().cast(), piece.len() as c_int) };
        }
    }
}

/// Arena of NUL-terminated strings plus a NULL-terminated pointer array.
///
/// Strings containing a NUL byte are truncated there, as a C reader would.
#[derive(Default)]
struct CStrings {
    bytes: Vec<u8>,
    starts: Vec<usize>,
    pointers: Vec<*const c_char>,
}

impl CStrings {
    fn clear(&mut self) {
        self.bytes.clear();
        self.starts.clear();
    }

    fn push(&mut self, s: &[u8]) {
        let s = memchr(0, s).map_or(s, |nul| &s[..nul]);
        self.starts.push(self.bytes.len());
        self.bytes.extend_from_slice(s);
        self.bytes.push(0);
    }

    /// Pointers to every pushed string, followed by a NULL terminator.
    ///
    /// Valid until the next `push` or `clear`.
    fn pointers(&mut self) -> &mut [*const c_char] {
        let base = self.bytes.as_ptr();
        self.pointers.clear();
        self.pointers.extend(
            self.starts
                .iter()
                .map(|&start| base.wrapping_add(start).cast::<c_char>()),
        );
        self.pointers.push(ptr::null());
        &mut self.pointers
    }

    /// Replace the arena with one string and return a pointer to it
    fn single(&mut self, s: &[u8]) -> *const c_char {
        self.clear();
        self.push(s);
        self.bytes.as_ptr().cast()
    }
}
