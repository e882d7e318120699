//! Handler Kinds, Slots and Ids
//!
//! The three small value types the dispatch table is indexed by.

use std::fmt;
use std::str::FromStr;

use super::error::DispatchError;

/// Event categories the native parser can call back for.
///
/// The discriminant is the column index in a handler row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandlerKind {
    StartTag = 0,
    EndTag = 1,
    CharacterData = 2,
    Comment = 3,
    StartCdata = 4,
    EndCdata = 5,
}

impl HandlerKind {
    /// Number of kinds (width of a handler row)
    pub const COUNT: usize = 6;

    /// Every kind, in column order
    pub const ALL: [HandlerKind; Self::COUNT] = [
        HandlerKind::StartTag,
        HandlerKind::EndTag,
        HandlerKind::CharacterData,
        HandlerKind::Comment,
        HandlerKind::StartCdata,
        HandlerKind::EndCdata,
    ];

    /// Column index of this kind
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used on the Elixir side
    pub const fn name(self) -> &'static str {
        match self {
            HandlerKind::StartTag => "start_tag",
            HandlerKind::EndTag => "end_tag",
            HandlerKind::CharacterData => "character_data",
            HandlerKind::Comment => "comment",
            HandlerKind::StartCdata => "start_cdata",
            HandlerKind::EndCdata => "end_cdata",
        }
    }
}

impl TryFrom<u8> for HandlerKind {
    type Error = DispatchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(DispatchError::KindOutOfRange(value as u32))
    }
}

impl TryFrom<u32> for HandlerKind {
    type Error = DispatchError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| DispatchError::KindOutOfRange(value))
            .and_then(HandlerKind::try_from)
    }
}

impl FromStr for HandlerKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DispatchError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row index of one logical parser instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParserSlot(usize);

impl ParserSlot {
    #[inline]
    pub const fn new(index: usize) -> Self {
        ParserSlot(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for ParserSlot {
    fn from(index: usize) -> Self {
        ParserSlot(index)
    }
}

impl fmt::Display for ParserSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-defined handler identifier.
///
/// Always non-negative: the unset sentinel is not representable, so a
/// `HandlerId` can never corrupt a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(i32);

impl HandlerId {
    /// Create a handler id, rejecting negative values
    pub fn new(value: i64) -> Result<Self, DispatchError> {
        match i32::try_from(value) {
            Ok(v) if v >= 0 => Ok(HandlerId(v)),
            _ => Err(DispatchError::InvalidHandlerId(value)),
        }
    }

    /// Decode a raw table entry; negative values read as unset
    #[inline]
    pub(crate) fn from_raw(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(HandlerId(raw))
    }

    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for HandlerId {
    type Error = DispatchError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        HandlerId::new(value)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
