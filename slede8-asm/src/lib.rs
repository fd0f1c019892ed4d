//! Two-pass assembler for SLEDE8
//!
//! Source is line-oriented: each line holds an instruction, a `.DATA`
//! directive, a `label:` definition, or nothing.  Comments start with `;`.
//!
//! ```text
//! ; echo input until a zero byte
//! løkke:
//!     LES r5
//!     LIK r5, r10
//!     BHOPP ferdig
//!     SKRIV r5
//!     HOPP løkke
//! ferdig:
//!     STOPP
//! ```
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod encode;
mod lexer;

pub use lexer::ParseError;

use encode::{Mode, encode};
use lexer::Line;
use log::debug;
use std::collections::HashMap;
use thiserror::Error;

/// Error returned by [`assemble`] and [`compile`]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A line failed to parse or encode
    #[error("line {line}")]
    Line {
        /// 1-based line number
        line: usize,
        /// What went wrong
        source: ParseError,
    },

    /// The program doesn't fit in memory
    #[error("program doesn't fit in {limit} bytes")]
    TooLarge {
        /// Memory size, in bytes
        limit: usize,
    },
}

/// Assembles a single line, which may not define or reference labels
///
/// Blank and comment-only lines produce no bytes.
pub fn assemble_line(line: &str) -> Result<Vec<u8>, ParseError> {
    match lexer::tokenize(line)? {
        Line::Empty => Ok(vec![]),
        Line::Label(..) => Err(ParseError::LabelInSingleLine),
        Line::Op { mnemonic, args } => encode(Mode::SingleLine, mnemonic, args),
    }
}

/// Assembles a complete program into a raw memory image
///
/// The first pass records label offsets and checks that the program fits in
/// memory; the second pass encodes every line with labels resolved.  Errors
/// abort assembly without returning partial output.
pub fn assemble(src: &str) -> Result<Vec<u8>, Error> {
    let mut labels = HashMap::new();
    let mut ops = vec![];
    let mut offset = 0;
    for (i, text) in src.lines().enumerate() {
        let line = i + 1;
        let at = |source: ParseError| Error::Line { line, source };
        match lexer::tokenize(text).map_err(at)? {
            Line::Empty => (),
            Line::Label(name) => {
                // offset < MEM_SIZE, checked below
                if labels.insert(name.to_owned(), offset as u16).is_some() {
                    return Err(at(ParseError::DuplicateLabel(name.to_owned())));
                }
            }
            Line::Op { mnemonic, args } => {
                offset += encode(Mode::FirstPass, mnemonic, args)
                    .map_err(at)?
                    .len();
                if offset >= slede8::MEM_SIZE {
                    return Err(Error::TooLarge {
                        limit: slede8::MEM_SIZE,
                    });
                }
                ops.push((line, mnemonic, args));
            }
        }
    }
    debug!("first pass: {} labels, {offset} bytes", labels.len());

    let mut out = Vec::with_capacity(offset);
    for (line, mnemonic, args) in ops {
        let bytes = encode(Mode::FinalPass(&labels), mnemonic, args)
            .map_err(|source| Error::Line { line, source })?;
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Assembles a program into a loadable binary, header included
pub fn compile(src: &str) -> Result<Vec<u8>, Error> {
    assemble(src).map(|code| slede8::with_header(&code))
}
