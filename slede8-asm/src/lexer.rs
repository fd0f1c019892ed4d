//! Line tokenizer and operand parsers
use slede8::word::Reg;
use thiserror::Error;

/// Reasons why a single line fails to assemble
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line is neither a label, a comment, nor `mnemonic args`
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// The mnemonic isn't part of the instruction set
    #[error("unrecognized mnemonic '{0}'")]
    UnknownMnemonic(String),

    /// An instruction that takes no operands was given some
    #[error("{0} can't take arguments")]
    UnexpectedArguments(String),

    /// Wrong number of comma-separated operands
    #[error("expected {expected} arguments, found {found}")]
    ArgumentCount {
        /// Operands required by the mnemonic
        expected: usize,
        /// Operands present on the line
        found: usize,
    },

    /// The operand isn't shaped like `rN`
    #[error("expected register, found '{0}'")]
    InvalidRegister(String),

    /// The operand is shaped like `rN`, but `N` is too large
    #[error("bad register: r{0}")]
    RegisterOutOfRange(u32),

    /// The operand isn't a recognizable number
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// The operand doesn't fit in a byte
    #[error("value out of range: {0} (expected 0-255)")]
    ImmediateOutOfRange(i64),

    /// The character literal doesn't fit in a byte
    #[error("character {0:?} doesn't fit in a byte")]
    CharOutOfRange(char),

    /// The operand doesn't fit in 12 bits
    #[error("address out of range: {0} (expected 0-4095)")]
    AddressOutOfRange(i64),

    /// A `.DATA` string is missing its closing quote
    #[error("missing closing double quote")]
    UnterminatedString,

    /// A `.DATA` string ends in a lone backslash
    #[error("bad escape sequence")]
    BadEscape,

    /// Two `.DATA` items aren't separated by a comma
    #[error("expected comma")]
    ExpectedComma,

    /// A `.DATA` list ends with a comma
    #[error("trailing comma")]
    TrailingComma,

    /// A `.DATA` item isn't a string, character or number
    #[error("unexpected .DATA sequence: {0}")]
    UnexpectedData(String),

    /// Labels were used in single-line mode
    #[error("labels are not supported in single line mode")]
    LabelInSingleLine,

    /// A referenced label was never defined
    #[error("label not found: {0}")]
    UndefinedLabel(String),

    /// A label was defined more than once
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),
}

/// A single tokenized source line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Blank or comment-only
    Empty,
    /// `name:` on its own
    Label(&'a str),
    /// Mnemonic with its (possibly empty) argument string
    Op {
        /// Mnemonic as written, in its original case
        mnemonic: &'a str,
        /// Everything after the mnemonic, trimmed
        ///
        /// Comments are already stripped, except for `.DATA`, whose parser
        /// handles them itself.
        args: &'a str,
    },
}

/// Splits a line into a label, an operation, or nothing
pub fn tokenize(line: &str) -> Result<Line<'_>, ParseError> {
    let s = line.trim();
    if s.is_empty() || s.starts_with(';') {
        return Ok(Line::Empty);
    }

    if let Some(name) = strip_comment(s).trim_end().strip_suffix(':')
        && is_label(name)
    {
        return Ok(Line::Label(name));
    }

    let dot = usize::from(s.starts_with('.'));
    let end = s[dot..]
        .find(|c: char| !c.is_ascii_alphabetic())
        .map_or(s.len(), |i| i + dot);
    if end == dot {
        return Err(ParseError::InvalidExpression(s.to_owned()));
    }
    let (mnemonic, rest) = s.split_at(end);

    // .DATA strings may contain semicolons, so its parser handles comments
    let args = if mnemonic.eq_ignore_ascii_case(".DATA") {
        rest.trim()
    } else {
        strip_comment(rest).trim()
    };
    Ok(Line::Op { mnemonic, args })
}

/// Truncates at the first `;` that isn't inside a character literal
fn strip_comment(s: &str) -> &str {
    let mut rest = s;
    while let Some(i) = rest.find(['\'', ';']) {
        let tail = &rest[i..];
        if tail.starts_with(';') {
            return &s[..s.len() - tail.len()];
        }
        // skip a whole 'x' literal, so that ''' and ';' are both opaque
        rest = match char_literal(tail) {
            Some((_, after)) => after,
            None => &tail[1..],
        };
    }
    s
}

/// Checks whether `s` is a valid label name
///
/// Labels start with a letter or underscore, followed by letters, digits and
/// underscores.  Letters may be non-ASCII (`ÆØÅ` and friends).
pub fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Splits a comma-separated operand list, requiring exactly `N` operands
fn split_args<const N: usize>(args: &str) -> Result<[&str; N], ParseError> {
    let parts: Vec<&str> = if args.is_empty() {
        vec![]
    } else {
        args.split(',').map(str::trim).collect()
    };
    let found = parts.len();
    parts.try_into().map_err(|_| ParseError::ArgumentCount {
        expected: N,
        found,
    })
}

/// Parses a register operand (`r0` through `r15`, either case)
pub fn parse_reg(s: &str) -> Result<Reg, ParseError> {
    let s = s.trim();
    let bad = || ParseError::InvalidRegister(s.to_owned());
    let digits = s.strip_prefix(['r', 'R']).ok_or_else(bad)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let n: u32 = digits.parse().map_err(|_| bad())?;
    match u8::try_from(n) {
        Ok(i) if usize::from(i) < slede8::REG_COUNT => Ok(Reg::new(i)),
        _ => Err(ParseError::RegisterOutOfRange(n)),
    }
}

/// Parses a single register operand, as used by `LAST`, `LES` and friends
pub fn parse_reg1(args: &str) -> Result<Reg, ParseError> {
    let [a] = split_args(args)?;
    parse_reg(a)
}

/// Parses a `reg, reg` operand pair
pub fn parse_reg_reg(args: &str) -> Result<(Reg, Reg), ParseError> {
    let [a, b] = split_args(args)?;
    Ok((parse_reg(a)?, parse_reg(b)?))
}

/// Second operand of `SETT`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Another register
    Reg(Reg),
    /// An 8-bit immediate
    Imm(u8),
}

/// Parses either `reg, reg` or `reg, imm8`
///
/// The second operand is a register if it looks like one (`r` followed by a
/// digit); otherwise, it must be an immediate.
pub fn parse_reg_source(args: &str) -> Result<(Reg, Source), ParseError> {
    let (a, b) = args.split_once(',').ok_or(ParseError::ArgumentCount {
        expected: 2,
        found: usize::from(!args.is_empty()),
    })?;
    let dst = parse_reg(a)?;
    let b = b.trim();
    let looks_like_reg = b
        .strip_prefix(['r', 'R'])
        .is_some_and(|d| d.starts_with(|c: char| c.is_ascii_digit()));
    let src = if looks_like_reg {
        Source::Reg(parse_reg(b)?)
    } else {
        Source::Imm(parse_imm8(b)?)
    };
    Ok((dst, src))
}

/// Splits off a single-quoted character literal
fn char_literal(s: &str) -> Option<(char, &str)> {
    let rest = s.strip_prefix('\'')?;
    let mut chars = rest.chars();
    let c = chars.next()?;
    let rest = chars.as_str().strip_prefix('\'')?;
    Some((c, rest))
}

fn char_byte(c: char) -> Result<u8, ParseError> {
    u8::try_from(c).map_err(|_| ParseError::CharOutOfRange(c))
}

/// Parses a number in `0xHH`, `HHh`, or decimal format
///
/// Returns `None` if the string isn't shaped like a number at all.
fn parse_number(s: &str) -> Option<Result<i64, ParseError>> {
    let is_hex =
        |d: &str| !d.is_empty() && d.bytes().all(|b| b.is_ascii_hexdigit());
    let (digits, radix) = if let Some(d) =
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
        && is_hex(d)
    {
        (d, 16)
    } else if let Some(d) = s.strip_suffix(['h', 'H'])
        && is_hex(d)
    {
        (d, 16)
    } else {
        let d = s.strip_prefix(['+', '-']).unwrap_or(s);
        if d.is_empty() || !d.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        (s, 10)
    };
    Some(
        i64::from_str_radix(digits, radix)
            .map_err(|_| ParseError::InvalidNumber(s.to_owned())),
    )
}

/// Parses an 8-bit immediate: `'c'`, `0xHH`, `HHh`, or decimal
pub fn parse_imm8(s: &str) -> Result<u8, ParseError> {
    let s = s.trim();
    if let Some((c, "")) = char_literal(s) {
        return char_byte(c);
    }
    let v = parse_number(s)
        .ok_or_else(|| ParseError::InvalidNumber(s.to_owned()))??;
    u8::try_from(v).map_err(|_| ParseError::ImmediateOutOfRange(v))
}

/// Jump / call target, before label resolution
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// A literal 12-bit address
    Addr(u16),
    /// A label name
    Label(&'a str),
}

/// Parses a 12-bit address or a label
///
/// Hex literals win over labels, so `abch` is an address rather than a name.
pub fn parse_target(s: &str) -> Result<Target<'_>, ParseError> {
    let s = s.trim();
    let v = match parse_number(s) {
        Some(v) => v?,
        None if is_label(s) => return Ok(Target::Label(s)),
        None => return Err(ParseError::InvalidNumber(s.to_owned())),
    };
    match u16::try_from(v) {
        Ok(a) if a <= 0xfff => Ok(Target::Addr(a)),
        _ => Err(ParseError::AddressOutOfRange(v)),
    }
}

/// Parses the argument list of a `.DATA` directive
///
/// Items are double-quoted strings (with `\n`, `\t`, `\r` and `\X` escapes),
/// character literals, and numbers, separated by commas.  A `;` after an item
/// starts a comment.
pub fn parse_data(args: &str) -> Result<Vec<u8>, ParseError> {
    let mut out = vec![];
    let mut s = args.trim();
    while !s.is_empty() {
        s = s.trim_start_matches([' ', '\t']);
        if let Some(rest) = s.strip_prefix('"') {
            s = parse_string(rest, &mut out)?;
        } else if let Some((c, rest)) = char_literal(s) {
            out.push(char_byte(c)?);
            s = rest;
        } else {
            let end = s.find([',', ';', ' ', '\t']).unwrap_or(s.len());
            let (item, rest) = s.split_at(end);
            let v = parse_number(item)
                .ok_or_else(|| ParseError::UnexpectedData(s.to_owned()))??;
            out.push(
                u8::try_from(v)
                    .map_err(|_| ParseError::ImmediateOutOfRange(v))?,
            );
            s = rest;
        }

        s = s.trim_start_matches([' ', '\t']);
        match s.chars().next() {
            None | Some(';') => break,
            Some(',') => {
                s = &s[1..];
                if s.trim().is_empty() {
                    return Err(ParseError::TrailingComma);
                }
            }
            Some(_) => return Err(ParseError::ExpectedComma),
        }
    }
    Ok(out)
}

/// Parses the body of a string literal, returning the text after its close
fn parse_string<'a>(
    mut s: &'a str,
    out: &mut Vec<u8>,
) -> Result<&'a str, ParseError> {
    let mut buf = [0u8; 4];
    loop {
        let mut chars = s.chars();
        let c = match chars.next() {
            None => return Err(ParseError::UnterminatedString),
            Some('"') => return Ok(chars.as_str()),
            Some('\\') => match chars.next() {
                None => return Err(ParseError::BadEscape),
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some(c) => c,
            },
            Some(c) => c,
        };
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        s = chars.as_str();
    }
}
