//! Resumable Markup Lexer
//!
//! Splits the push parser's buffered input into tokens. A construct is only
//! reported once it is complete in the buffer; otherwise the lexer answers
//! `Step::Incomplete` and leaves its position at the start of the construct so
//! the parser can keep those bytes for the next chunk.

use crate::core::scanner::{is_name_start_char, Scanner};

/// (name, raw value) pair borrowed from the input
pub type Attribute<'a> = (&'a [u8], &'a [u8]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Start tag; its attributes are written to the caller's buffer
    StartTag { name: &'a [u8], empty: bool },
    EndTag { name: &'a [u8] },
    /// Raw character data, entities not yet decoded
    Text(&'a [u8]),
    /// CDATA content without the `<![CDATA[` and `]]>` markers
    CData(&'a [u8]),
    /// Comment content without the `<!--` and `-->` markers
    Comment(&'a [u8]),
    /// Processing instruction, DOCTYPE, stray `<!...>` or a nameless end
    /// tag: consumed, no event
    Ignored(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Token(Token<'a>),
    /// The next construct is not complete in the buffer
    Incomplete,
    /// Every buffered byte has been consumed
    End,
}

pub struct Lexer<'a> {
    scanner: Scanner<'a>,
    /// No more input will follow this buffer
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8], at_eof: bool) -> Self {
        Lexer {
            scanner: Scanner::new(input),
            at_eof,
        }
    }

    /// Bytes fully consumed so far
    #[inline]
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Lex the next token, filling `attrs` for start tags
    pub fn next_token(&mut self, attrs: &mut Vec<Attribute<'a>>) -> Step<'a> {
        let start = self.scanner.position();
        let step = match self.scanner.peek() {
            None => return Step::End,
            Some(b'<') => self.lex_markup(attrs),
            Some(_) => self.lex_text(),
        };
        if step == Step::Incomplete {
            self.scanner.set_position(start);
        }
        step
    }

    fn lex_text(&mut self) -> Step<'a> {
        let start = self.scanner.position();
        let end = match self.scanner.find_byte(b'<') {
            Some(end) => end,
            None if self.at_eof => start + self.scanner.remaining_len(),
            // Wait for the terminating markup so entity references are never split
            None => return Step::Incomplete,
        };
        self.scanner.set_position(end);
        Step::Token(Token::Text(self.scanner.slice(start, end)))
    }

    /// Lex markup starting with '<'
    fn lex_markup(&mut self, attrs: &mut Vec<Attribute<'a>>) -> Step<'a> {
        let start = self.scanner.position();

        match self.scanner.peek_at(1) {
            None if self.at_eof => self.lone_lt(start),
            None => Step::Incomplete,
            Some(b'/') => self.lex_end_tag(start),
            Some(b'!') => self.lex_bang(start),
            Some(b'?') => self.lex_pi(start),
            Some(c) if is_name_start_char(c) => self.lex_start_tag(start, attrs),
            // Invalid markup (e.g. "<1invalid/>"): the '<' is literal text
            Some(_) => self.lone_lt(start),
        }
    }

    fn lone_lt(&mut self, start: usize) -> Step<'a> {
        self.scanner.set_position(start + 1);
        Step::Token(Token::Text(self.scanner.slice(start, start + 1)))
    }

    fn lex_start_tag(&mut self, start: usize, attrs: &mut Vec<Attribute<'a>>) -> Step<'a> {
        let Some(gt) = self.scanner.find_tag_end_quoted() else {
            return Step::Incomplete;
        };

        self.scanner.set_position(start + 1);
        let Some(name) = self.scanner.read_name() else {
            return Step::Incomplete;
        };

        attrs.clear();
        loop {
            self.scanner.skip_whitespace();
            if self.scanner.position() >= gt {
                break;
            }
            match self.scanner.peek() {
                Some(c) if is_name_start_char(c) => {
                    if let Some(attr) = self.lex_attribute(gt) {
                        attrs.push(attr);
                    }
                }
                _ => self.scanner.advance(1),
            }
        }

        let name_end = start + 1 + name.len();
        let empty = gt > name_end && self.scanner.slice(gt - 1, gt) == b"/";
        self.scanner.set_position(gt + 1);
        Step::Token(Token::StartTag { name, empty })
    }

    /// Lex `name="value"` inside a tag that ends at `gt`
    fn lex_attribute(&mut self, gt: usize) -> Option<Attribute<'a>> {
        let name = self.scanner.read_name()?;

        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'=') {
            return None;
        }
        self.scanner.advance(1);
        self.scanner.skip_whitespace();

        let quote = self.scanner.peek().filter(|q| matches!(q, b'"' | b'\''))?;
        self.scanner.advance(1);

        let value_start = self.scanner.position();
        let value_end = self
            .scanner
            .find_byte(quote)
            .filter(|&end| end < gt)
            .unwrap_or(gt);
        self.scanner.set_position((value_end + 1).min(gt));

        Some((name, self.scanner.slice(value_start, value_end)))
    }

    fn lex_end_tag(&mut self, start: usize) -> Step<'a> {
        self.scanner.set_position(start + 2);
        let Some(gt) = self.scanner.find_byte(b'>') else {
            return Step::Incomplete;
        };

        self.scanner.skip_whitespace();
        let token = match self.scanner.read_name() {
            Some(name) if self.scanner.position() <= gt => Token::EndTag { name },
            _ => Token::Ignored(self.scanner.slice(start, gt + 1)),
        };
        self.scanner.set_position(gt + 1);
        Step::Token(token)
    }

    /// Comment, CDATA section, DOCTYPE or other `<!` declaration
    fn lex_bang(&mut self, start: usize) -> Step<'a> {
        if self.scanner.starts_with(b"<!--") {
            return self.lex_delimited(start, 4, b"-->", Token::Comment);
        }
        if self.scanner.starts_with(b"<![CDATA[") {
            return self.lex_delimited(start, 9, b"]]>", Token::CData);
        }
        if self.scanner.is_partial(b"<!--") || self.scanner.is_partial(b"<![CDATA[") {
            return Step::Incomplete;
        }

        // DOCTYPE may carry an internal subset with nested '>'
        self.scanner.set_position(start + 2);
        let mut depth = 0usize;
        while let Some(c) = self.scanner.peek() {
            match c {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => {
                    self.scanner.advance(1);
                    let end = self.scanner.position();
                    return Step::Token(Token::Ignored(self.scanner.slice(start, end)));
                }
                _ => {}
            }
            self.scanner.advance(1);
        }
        Step::Incomplete
    }

    fn lex_delimited(
        &mut self,
        start: usize,
        open_len: usize,
        close: &[u8],
        token: fn(&'a [u8]) -> Token<'a>,
    ) -> Step<'a> {
        let content_start = start + open_len;
        self.scanner.set_position(content_start);
        let Some(content_end) = self.scanner.find_seq(close) else {
            return Step::Incomplete;
        };
        self.scanner.set_position(content_end + close.len());
        Step::Token(token(self.scanner.slice(content_start, content_end)))
    }

    fn lex_pi(&mut self, start: usize) -> Step<'a> {
        self.scanner.set_position(start + 2);
        let Some(end) = self.scanner.find_seq(b"?>") else {
            return Step::Incomplete;
        };
        self.scanner.set_position(end + 2);
        Step::Token(Token::Ignored(self.scanner.slice(start, end + 2)))
    }
}
