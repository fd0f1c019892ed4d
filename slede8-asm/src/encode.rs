//! Mnemonic table and instruction encoder
use crate::lexer::{self, ParseError, Source, Target};
use slede8::word::{AluOp, CmpOp, Instruction, Reg, mnemonic};
use std::collections::HashMap;

/// How label references are resolved
#[derive(Copy, Clone, Debug)]
pub(crate) enum Mode<'a> {
    /// Labels are forbidden
    SingleLine,
    /// Labels resolve to 0, since only lengths matter
    FirstPass,
    /// Labels resolve through the table built by the first pass
    FinalPass(&'a HashMap<String, u16>),
}

impl Mode<'_> {
    fn resolve(self, args: &str) -> Result<u16, ParseError> {
        let name = match lexer::parse_target(args)? {
            Target::Addr(a) => return Ok(a),
            Target::Label(name) => name,
        };
        match self {
            Mode::SingleLine => Err(ParseError::LabelInSingleLine),
            Mode::FirstPass => Ok(0),
            Mode::FinalPass(labels) => labels
                .get(name)
                .copied()
                .ok_or_else(|| ParseError::UndefinedLabel(name.to_owned())),
        }
    }
}

/// Encodes one operation into bytes
///
/// The output length depends only on `name` and `args`, never on `mode`,
/// so both passes agree on every offset.
pub(crate) fn encode(
    mode: Mode,
    name: &str,
    args: &str,
) -> Result<Vec<u8>, ParseError> {
    let upper = name.to_ascii_uppercase();
    let no_args = |i: Instruction| {
        if args.is_empty() {
            Ok(i)
        } else {
            Err(ParseError::UnexpectedArguments(upper.clone()))
        }
    };

    let i = match upper.as_str() {
        ".DATA" => return lexer::parse_data(args),
        "STOPP" => no_args(Instruction::Halt)?,
        "RETUR" => no_args(Instruction::Ret)?,
        "NOPE" => no_args(Instruction::Nop)?,
        m if m == mnemonic::VSYNC => no_args(Instruction::VSync)?,
        "SETT" => match lexer::parse_reg_source(args)? {
            (dst, Source::Imm(val)) => Instruction::SetImm { dst, val },
            (dst, Source::Reg(src)) => Instruction::SetReg { dst, src },
        },
        "FINN" => Instruction::Finn {
            addr: mode.resolve(args)?,
        },
        "HOPP" => Instruction::Jump {
            addr: mode.resolve(args)?,
        },
        "BHOPP" => Instruction::JumpIf {
            addr: mode.resolve(args)?,
        },
        "TUR" => Instruction::Call {
            addr: mode.resolve(args)?,
        },
        m => {
            if let Some(f) = lookup(&mnemonic::LOAD_STORE, m) {
                load_store(f, lexer::parse_reg1(args)?)
            } else if let Some(f) = lookup(&mnemonic::IO, m) {
                io(f, lexer::parse_reg1(args)?)
            } else if let Some(op) = lookup(&mnemonic::ALU, m)
                .and_then(AluOp::from_op)
            {
                let (dst, src) = lexer::parse_reg_reg(args)?;
                Instruction::Alu { op, dst, src }
            } else if let Some(op) =
                lookup(&mnemonic::CMP, m).and_then(CmpOp::from_op)
            {
                let (a, b) = lexer::parse_reg_reg(args)?;
                Instruction::Cmp { op, a, b }
            } else {
                return Err(ParseError::UnknownMnemonic(name.to_owned()));
            }
        }
    };
    Ok(i.encode().to_le_bytes().to_vec())
}

/// Finds the `op` index of a mnemonic within a class table
fn lookup(table: &[&str], m: &str) -> Option<u8> {
    table.iter().position(|t| *t == m).map(|i| i as u8)
}

fn load_store(op: u8, r: Reg) -> Instruction {
    match op {
        0 => Instruction::Load { dst: r },
        1 => Instruction::Store { src: r },
        2 => Instruction::FbLoad { dst: r },
        _ => Instruction::FbStore { src: r },
    }
}

fn io(op: u8, r: Reg) -> Instruction {
    match op {
        0 => Instruction::Read { dst: r },
        1 => Instruction::Write { src: r },
        2 => Instruction::PortIn { dst: r },
        _ => Instruction::PortOut { src: r },
    }
}
