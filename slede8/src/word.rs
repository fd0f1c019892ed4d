//! Instruction word layout
//!
//! A SLEDE8 instruction is a 16-bit little-endian word.  The low nibble always
//! selects the instruction class; the remaining 12 bits are interpreted
//! differently depending on the class:
//!
//! ```text
//!  15    12 11     8 7      4 3      0
//! +--------+--------+--------+--------+
//! |  arg2  |  arg1  |   op   | class  |
//! +--------+--------+--------+--------+
//! |      value      |
//! +-----------------+--------+
//! |         address          |
//! +--------------------------+
//! ```
use core::fmt;

/// Instruction classes, stored in bits 0-3 of a word
pub mod class {
    /// `STOPP`
    pub const HALT: u8 = 0x0;
    /// `SETT rN, imm8`
    pub const MOV_IMM: u8 = 0x1;
    /// `SETT rN, rM`
    pub const MOV_REG: u8 = 0x2;
    /// `FINN addr`
    pub const FINN: u8 = 0x3;
    /// `LAST`, `LAGR`, `VLAST`, `VLAGR`
    pub const LOAD_STORE: u8 = 0x4;
    /// Arithmetic and logic
    pub const ALU: u8 = 0x5;
    /// `LES`, `SKRIV`, `INN`, `UT`, `VSYNK`
    pub const IO: u8 = 0x6;
    /// Comparisons, which write the flag
    pub const CMP: u8 = 0x7;
    /// `HOPP addr`
    pub const JMP: u8 = 0x8;
    /// `BHOPP addr`
    pub const COND_JMP: u8 = 0x9;
    /// `TUR addr`
    pub const CALL: u8 = 0xa;
    /// `RETUR`
    pub const RET: u8 = 0xb;
    /// `NOPE`
    pub const NOP: u8 = 0xc;
}

/// Mnemonics for op-dispatched classes, indexed by the `op` field
pub mod mnemonic {
    /// Load / store ops (class [`LOAD_STORE`](super::class::LOAD_STORE))
    pub const LOAD_STORE: [&str; 4] = ["LAST", "LAGR", "VLAST", "VLAGR"];
    /// ALU ops (class [`ALU`](super::class::ALU))
    pub const ALU: [&str; 7] =
        ["OG", "ELLER", "XELLER", "VSKIFT", "HSKIFT", "PLUSS", "MINUS"];
    /// Register-operand IO ops (class [`IO`](super::class::IO))
    pub const IO: [&str; 4] = ["LES", "SKRIV", "INN", "UT"];
    /// IO op 4, which takes no operands
    pub const VSYNC: &str = "VSYNK";
    /// Comparison ops (class [`CMP`](super::class::CMP))
    pub const CMP: [&str; 6] = ["LIK", "ULIK", "ME", "MEL", "SE", "SEL"];
}

/// IO op index of the parameterless vsync instruction
pub const IO_VSYNC: u8 = 4;

/// Builder for a single instruction word
///
/// Every setter masks its argument to the field width and merges it into the
/// word without touching other fields, so setters may be chained in any
/// order.  Fields overlap (e.g. `val` covers both `arg1` and `arg2`); the last
/// writer wins for the shared bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Word(u16);

impl Word {
    /// Starts a new word of the given class, with all other bits cleared
    pub const fn new(class: u8) -> Self {
        Self(class as u16 & 0xf)
    }

    /// Sets the `op` field (bits 4-7)
    pub const fn with_op(self, op: u8) -> Self {
        Self((self.0 & 0xff0f) | ((op as u16 & 0xf) << 4))
    }

    /// Sets the `value` field (bits 8-15)
    pub const fn with_val(self, val: u8) -> Self {
        Self((self.0 & 0x00ff) | ((val as u16) << 8))
    }

    /// Sets the `arg1` field (bits 8-11)
    pub const fn with_arg1(self, arg: u8) -> Self {
        Self((self.0 & 0xf0ff) | ((arg as u16 & 0xf) << 8))
    }

    /// Sets the `arg2` field (bits 12-15)
    pub const fn with_arg2(self, arg: u8) -> Self {
        Self((self.0 & 0x0fff) | ((arg as u16 & 0xf) << 12))
    }

    /// Sets the 12-bit `address` field (bits 4-15)
    pub const fn with_addr(self, addr: u16) -> Self {
        Self((self.0 & 0x000f) | ((addr & 0xfff) << 4))
    }

    /// Returns the raw word
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns the word as it is laid out in memory
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl From<Word> for u16 {
    fn from(w: Word) -> u16 {
        w.0
    }
}

/// Flat decode of a word, with every candidate field populated
///
/// Which fields are meaningful depends on `class`; the others are simply
/// whatever bits happen to sit there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fields {
    /// The undecoded word
    pub raw: u16,
    /// Bits 0-3
    pub class: u8,
    /// Bits 4-7
    pub op: u8,
    /// Bits 4-15
    pub addr: u16,
    /// Bits 8-15
    pub val: u8,
    /// Bits 8-11
    pub arg1: u8,
    /// Bits 12-15
    pub arg2: u8,
}

impl Fields {
    /// Splits a word into its fields
    pub const fn decode(w: u16) -> Self {
        Self {
            raw: w,
            class: (w & 0xf) as u8,
            op: ((w >> 4) & 0xf) as u8,
            addr: w >> 4,
            val: (w >> 8) as u8,
            arg1: ((w >> 8) & 0xf) as u8,
            arg2: ((w >> 12) & 0xf) as u8,
        }
    }
}

/// Index into the register file
///
/// This can only hold values in `0..16`, so indexing the register file with it
/// never fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    /// Builds a register index
    ///
    /// # Panics
    /// If `i >= 16`; decoded nibbles can never trip this, so a panic here is
    /// always a bug in the caller rather than in a guest program.
    pub const fn new(i: u8) -> Self {
        assert!(i < 16, "register index out of range");
        Self(i)
    }

    /// Returns the register number
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the register number as an array index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Arithmetic / logic operation, stored in the `op` field of an ALU word
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// `OG`: bitwise and
    And = 0,
    /// `ELLER`: bitwise or
    Or = 1,
    /// `XELLER`: bitwise exclusive or
    Xor = 2,
    /// `VSKIFT`: shift left
    Shl = 3,
    /// `HSKIFT`: shift right
    Shr = 4,
    /// `PLUSS`: wrapping add
    Add = 5,
    /// `MINUS`: wrapping subtract
    Sub = 6,
}

impl AluOp {
    const ALL: [Self; 7] = [
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Shl,
        Self::Shr,
        Self::Add,
        Self::Sub,
    ];

    /// Looks up an op by its `op` field, returning `None` if it's unassigned
    pub fn from_op(op: u8) -> Option<Self> {
        Self::ALL.get(usize::from(op)).copied()
    }

    /// Applies the operation with 8-bit semantics
    ///
    /// Shifts by 8 or more clear the register entirely.
    pub fn apply(self, a: u8, b: u8) -> u8 {
        match self {
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
            Self::Shl => a.checked_shl(u32::from(b)).unwrap_or(0),
            Self::Shr => a.checked_shr(u32::from(b)).unwrap_or(0),
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
        }
    }
}

/// Comparison, stored in the `op` field of a CMP word
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    /// `LIK`: equal
    Eq = 0,
    /// `ULIK`: not equal
    Ne = 1,
    /// `ME`: less than
    Lt = 2,
    /// `MEL`: less than or equal
    Le = 3,
    /// `SE`: greater than
    Gt = 4,
    /// `SEL`: greater than or equal
    Ge = 5,
}

impl CmpOp {
    const ALL: [Self; 6] =
        [Self::Eq, Self::Ne, Self::Lt, Self::Le, Self::Gt, Self::Ge];

    /// Looks up a comparison by its `op` field
    pub fn from_op(op: u8) -> Option<Self> {
        Self::ALL.get(usize::from(op)).copied()
    }

    /// Evaluates the comparison on unsigned bytes
    pub fn test(self, a: u8, b: u8) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Gt => a > b,
            Self::Ge => a >= b,
        }
    }
}

/// Class-tagged decode of a word, used for execution
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `STOPP`
    Halt,
    /// `SETT dst, val`
    SetImm {
        /// Destination register
        dst: Reg,
        /// Immediate value
        val: u8,
    },
    /// `SETT dst, src`
    SetReg {
        /// Destination register
        dst: Reg,
        /// Source register
        src: Reg,
    },
    /// `FINN addr`, which loads `r0` / `r1` with the low / high address byte
    Finn {
        /// 12-bit address
        addr: u16,
    },
    /// `LAST dst`: load from memory at `r1:r0`
    Load {
        /// Destination register
        dst: Reg,
    },
    /// `LAGR src`: store to memory at `r1:r0`
    Store {
        /// Source register
        src: Reg,
    },
    /// `VLAST dst`: read from the framebuffer at `r1:r0`
    FbLoad {
        /// Destination register
        dst: Reg,
    },
    /// `VLAGR src`: write to the framebuffer at `r1:r0`
    FbStore {
        /// Source register
        src: Reg,
    },
    /// Arithmetic or logic, writing back into `dst`
    Alu {
        /// Operation
        op: AluOp,
        /// Left-hand operand and destination
        dst: Reg,
        /// Right-hand operand
        src: Reg,
    },
    /// `LES dst`: consume one byte of input
    Read {
        /// Destination register
        dst: Reg,
    },
    /// `SKRIV src`: append one byte of output
    Write {
        /// Source register
        src: Reg,
    },
    /// `INN dst`: read from the IO port at `r1:r0`
    PortIn {
        /// Destination register
        dst: Reg,
    },
    /// `UT src`: write to the IO port at `r1:r0`
    PortOut {
        /// Source register
        src: Reg,
    },
    /// `VSYNK`: present the framebuffer
    VSync,
    /// Comparison, writing the flag
    Cmp {
        /// Comparison
        op: CmpOp,
        /// Left-hand operand
        a: Reg,
        /// Right-hand operand
        b: Reg,
    },
    /// `HOPP addr`
    Jump {
        /// Target address
        addr: u16,
    },
    /// `BHOPP addr`, taken if the flag is set
    JumpIf {
        /// Target address
        addr: u16,
    },
    /// `TUR addr`
    Call {
        /// Target address
        addr: u16,
    },
    /// `RETUR`
    Ret,
    /// `NOPE`
    Nop,
    /// Unknown class or op
    Unsupported(u16),
}

impl Instruction {
    /// Decodes a word into an instruction
    ///
    /// This never fails; unassigned encodings become
    /// [`Instruction::Unsupported`].
    pub fn decode(w: u16) -> Self {
        let f = Fields::decode(w);
        let arg1 = Reg::new(f.arg1);
        let arg2 = Reg::new(f.arg2);
        match f.class {
            class::HALT => Self::Halt,
            class::MOV_IMM => Self::SetImm {
                dst: Reg::new(f.op),
                val: f.val,
            },
            class::MOV_REG => Self::SetReg {
                dst: Reg::new(f.op),
                src: arg1,
            },
            class::FINN => Self::Finn { addr: f.addr },
            class::LOAD_STORE => match f.op {
                0 => Self::Load { dst: arg1 },
                1 => Self::Store { src: arg1 },
                2 => Self::FbLoad { dst: arg1 },
                3 => Self::FbStore { src: arg1 },
                _ => Self::Unsupported(w),
            },
            class::ALU => match AluOp::from_op(f.op) {
                Some(op) => Self::Alu {
                    op,
                    dst: arg1,
                    src: arg2,
                },
                None => Self::Unsupported(w),
            },
            class::IO => match f.op {
                0 => Self::Read { dst: arg1 },
                1 => Self::Write { src: arg1 },
                2 => Self::PortIn { dst: arg1 },
                3 => Self::PortOut { src: arg1 },
                IO_VSYNC => Self::VSync,
                _ => Self::Unsupported(w),
            },
            class::CMP => match CmpOp::from_op(f.op) {
                Some(op) => Self::Cmp { op, a: arg1, b: arg2 },
                None => Self::Unsupported(w),
            },
            class::JMP => Self::Jump { addr: f.addr },
            class::COND_JMP => Self::JumpIf { addr: f.addr },
            class::CALL => Self::Call { addr: f.addr },
            class::RET => Self::Ret,
            class::NOP => Self::Nop,
            _ => Self::Unsupported(w),
        }
    }

    /// Encodes the instruction into its canonical word
    ///
    /// Unused bits are cleared, except for [`Instruction::Unsupported`], which
    /// returns its original word unchanged.
    pub fn encode(self) -> Word {
        use class::*;
        let reg = |c, op, r: Reg| Word::new(c).with_op(op).with_arg1(r.get());
        match self {
            Self::Halt => Word::new(HALT),
            Self::SetImm { dst, val } => {
                Word::new(MOV_IMM).with_op(dst.get()).with_val(val)
            }
            Self::SetReg { dst, src } => {
                Word::new(MOV_REG).with_op(dst.get()).with_arg1(src.get())
            }
            Self::Finn { addr } => Word::new(FINN).with_addr(addr),
            Self::Load { dst } => reg(LOAD_STORE, 0, dst),
            Self::Store { src } => reg(LOAD_STORE, 1, src),
            Self::FbLoad { dst } => reg(LOAD_STORE, 2, dst),
            Self::FbStore { src } => reg(LOAD_STORE, 3, src),
            Self::Alu { op, dst, src } => {
                reg(ALU, op as u8, dst).with_arg2(src.get())
            }
            Self::Read { dst } => reg(IO, 0, dst),
            Self::Write { src } => reg(IO, 1, src),
            Self::PortIn { dst } => reg(IO, 2, dst),
            Self::PortOut { src } => reg(IO, 3, src),
            Self::VSync => Word::new(IO).with_op(IO_VSYNC),
            Self::Cmp { op, a, b } => {
                reg(CMP, op as u8, a).with_arg2(b.get())
            }
            Self::Jump { addr } => Word::new(JMP).with_addr(addr),
            Self::JumpIf { addr } => Word::new(COND_JMP).with_addr(addr),
            Self::Call { addr } => Word::new(CALL).with_addr(addr),
            Self::Ret => Word::new(RET),
            Self::Nop => Word::new(NOP),
            Self::Unsupported(w) => Word(w),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn setters_commute() {
        let a = Word::new(class::ALU).with_op(5).with_arg1(0xa).with_arg2(0xb);
        let b = Word::new(class::ALU).with_arg2(0xb).with_arg1(0xa).with_op(5);
        assert_eq!(a, b);
        assert_eq!(a.get(), 0xba55);
    }

    #[test]
    fn setters_mask() {
        let w = Word::new(0xff).with_op(0xff).with_arg1(0x1f).with_arg2(0x2f);
        assert_eq!(w.get(), 0xffff);
        let w = Word::new(class::JMP).with_addr(0xffff);
        assert_eq!(w.get(), 0xfff8);
        let w = Word::new(class::MOV_IMM).with_op(11).with_val(1);
        assert_eq!(w.to_le_bytes(), [0xb1, 0x01]);
    }

    #[test]
    fn flat_decode() {
        let f = Fields::decode(0x5393);
        assert_eq!(f.class, class::FINN);
        assert_eq!(f.addr, 1337);
        assert_eq!(f.op, 9);
        assert_eq!(f.val, 0x53);
        assert_eq!(f.arg1, 3);
        assert_eq!(f.arg2, 5);
    }

    #[test]
    fn tagged_decode() {
        assert_eq!(
            Instruction::decode(0x01b1),
            Instruction::SetImm {
                dst: Reg::new(11),
                val: 1
            }
        );
        assert_eq!(
            Instruction::decode(0xa507),
            Instruction::Cmp {
                op: CmpOp::Eq,
                a: Reg::new(5),
                b: Reg::new(10)
            }
        );
        assert_eq!(Instruction::decode(0x0074), Instruction::Unsupported(0x74));
        assert_eq!(Instruction::decode(0x0075), Instruction::Unsupported(0x75));
        assert_eq!(Instruction::decode(0x0056), Instruction::Unsupported(0x56));
        assert_eq!(Instruction::decode(0x0067), Instruction::Unsupported(0x67));
        assert_eq!(Instruction::decode(0x000d), Instruction::Unsupported(0x0d));
        assert_eq!(Instruction::decode(0x0046), Instruction::VSync);
    }

    #[test]
    fn shifts_saturate() {
        assert_eq!(AluOp::Shl.apply(0x81, 1), 0x02);
        assert_eq!(AluOp::Shl.apply(0xff, 7), 0x80);
        assert_eq!(AluOp::Shl.apply(0xff, 8), 0);
        assert_eq!(AluOp::Shr.apply(0xff, 200), 0);
        assert_eq!(AluOp::Add.apply(0xff, 2), 1);
        assert_eq!(AluOp::Sub.apply(0, 1), 0xff);
    }

    #[test]
    fn reencode_is_canonical() {
        for w in 0..=u16::MAX {
            let i = Instruction::decode(w);
            assert_eq!(Instruction::decode(i.encode().get()), i, "{w:#06x}");
        }
    }

    #[test]
    #[should_panic]
    fn bad_register() {
        let _ = Reg::new(16);
    }
}
