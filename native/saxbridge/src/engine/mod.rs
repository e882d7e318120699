//! Native Push Parser
//!
//! The parser the trampolines are installed on. It speaks the calling
//! convention of a C push-parser library:
//!
//! - handlers are `unsafe extern "C" fn` pointers, set and cleared per kind
//! - every callback receives the parser's opaque `user_data` first
//! - names and comments arrive NUL-terminated, attributes as a NULL-terminated
//!   name/value array, character data as pointer + length
//!
//! ```text
//! PushParser::feed ──> Lexer ──> StartElementHandler(user_data, name, atts)
//!                               EndElementHandler(user_data, name)
//!                               CharacterDataHandler(user_data, s, len)
//!                               CommentHandler(user_data, data)
//!                               StartCdataSectionHandler(user_data)
//!                               EndCdataSectionHandler(user_data)
//! ```

pub mod callbacks;
mod lexer;
pub mod parser;

pub use callbacks::{CallbackSlots, Handlers};
pub use parser::{ParseError, PushParser};
