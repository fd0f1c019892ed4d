//! Disassembler
//!
//! Every one of the 65536 possible words renders to *something*: encodings
//! that don't correspond to an instruction come out as a `.DATA` directive
//! that reassembles to the same two bytes.  This lets a debugger render
//! arbitrary memory as code.
use crate::MEM_SIZE;
use crate::word::{class, mnemonic, Fields, IO_VSYNC};
use core::fmt;

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = usize::from(self.op);
        let unsupported = match self.class {
            class::HALT => return write!(f, "STOPP"),
            class::MOV_IMM => {
                return write!(f, "SETT r{}, 0x{:02x}", self.op, self.val)
            }
            class::MOV_REG => {
                return write!(f, "SETT r{}, r{}", self.op, self.arg1)
            }
            class::FINN => return write!(f, "FINN 0x{:03x}", self.addr),
            class::LOAD_STORE => match mnemonic::LOAD_STORE.get(op) {
                Some(m) => return write!(f, "{m} r{}", self.arg1),
                None => ("load/store op", self.op),
            },
            class::ALU => match mnemonic::ALU.get(op) {
                Some(m) => {
                    return write!(f, "{m} r{}, r{}", self.arg1, self.arg2)
                }
                None => ("ALU op", self.op),
            },
            class::IO => match mnemonic::IO.get(op) {
                Some(m) => return write!(f, "{m} r{}", self.arg1),
                None if self.op == IO_VSYNC => {
                    return write!(f, "{}", mnemonic::VSYNC)
                }
                None => ("IO op", self.op),
            },
            class::CMP => match mnemonic::CMP.get(op) {
                Some(m) => {
                    return write!(f, "{m} r{}, r{}", self.arg1, self.arg2)
                }
                None => ("Cmp op", self.op),
            },
            class::JMP => return write!(f, "HOPP 0x{:03x}", self.addr),
            class::COND_JMP => return write!(f, "BHOPP 0x{:03x}", self.addr),
            class::CALL => return write!(f, "TUR 0x{:03x}", self.addr),
            class::RET => return write!(f, "RETUR"),
            class::NOP => return write!(f, "NOPE"),
            _ => ("instruction class", self.class),
        };
        let (what, n) = unsupported;
        let [lo, hi] = self.raw.to_le_bytes();
        write!(f, ".DATA 0x{lo:02x}, 0x{hi:02x} ; unsupported {what} {n}")
    }
}

/// Renders a single word as assembly text
pub fn disassemble(word: u16) -> String {
    Fields::decode(word).to_string()
}

/// One line of a listing built by [`listing`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Byte address of the word
    pub addr: u16,
    /// Raw word, as read little-endian from memory
    pub word: u16,
    /// Disassembled text
    pub text: String,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [lo, hi] = self.word.to_le_bytes();
        write!(f, "{:03x}: {lo:02x} {hi:02x}  {}", self.addr, self.text)
    }
}

/// Disassembles a run of bytes, two at a time
///
/// `base` is the address of `data[0]`; addresses wrap around the 4 KiB
/// memory.  A trailing odd byte is treated as the low half of a word whose
/// high half is zero.
pub fn listing(data: &[u8], base: u16) -> Vec<Line> {
    data.chunks(2)
        .enumerate()
        .map(|(i, c)| {
            let hi = c.get(1).copied().unwrap_or(0);
            let word = u16::from_le_bytes([c[0], hi]);
            Line {
                addr: ((usize::from(base) + 2 * i) % MEM_SIZE) as u16,
                word,
                text: disassemble(word),
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_text() {
        for (word, text) in [
            (0x0000, "STOPP"),
            (0x01b1, "SETT r11, 0x01"),
            (0x0a52, "SETT r5, r10"),
            (0x5393, "FINN 0x539"),
            (0x0f04, "LAST r15"),
            (0x0014, "LAGR r0"),
            (0x0324, "VLAST r3"),
            (0x0334, "VLAGR r3"),
            (0xba55, "PLUSS r10, r11"),
            (0x7635, "VSKIFT r6, r7"),
            (0x0506, "LES r5"),
            (0x0716, "SKRIV r7"),
            (0x0126, "INN r1"),
            (0x0236, "UT r2"),
            (0x0046, "VSYNK"),
            (0xef07, "LIK r15, r14"),
            (0x4557, "SEL r5, r4"),
            (0xcba8, "HOPP 0xcba"),
            (0x1059, "BHOPP 0x105"),
            (0x019a, "TUR 0x019"),
            (0x000b, "RETUR"),
            (0x000c, "NOPE"),
        ] {
            assert_eq!(disassemble(word), text, "{word:#06x}");
        }
    }

    #[test]
    fn unsupported_renders_as_data() {
        assert_eq!(
            disassemble(0x1274),
            ".DATA 0x74, 0x12 ; unsupported load/store op 7"
        );
        assert_eq!(
            disassemble(0xbeef),
            ".DATA 0xef, 0xbe ; unsupported instruction class 15"
        );
        assert_eq!(
            disassemble(0x0075),
            ".DATA 0x75, 0x00 ; unsupported ALU op 7"
        );
        assert_eq!(
            disassemble(0x0056),
            ".DATA 0x56, 0x00 ; unsupported IO op 5"
        );
        assert_eq!(
            disassemble(0xff67),
            ".DATA 0x67, 0xff ; unsupported Cmp op 6"
        );
    }

    #[test]
    fn listing_pads_odd_byte() {
        let lines = listing(&[0xb1, 0x01, 0x0b], 0x100);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].addr, 0x100);
        assert_eq!(lines[0].text, "SETT r11, 0x01");
        assert_eq!(lines[1].addr, 0x102);
        assert_eq!(lines[1].word, 0x000b);
        assert_eq!(lines[1].to_string(), "102: 0b 00  RETUR");
    }

    #[test]
    fn listing_wraps_addresses() {
        let lines = listing(&[0u8; 70_000], 0xffe);
        assert_eq!(lines.len(), 35_000);
        assert_eq!(lines[0].addr, 0xffe);
        assert_eq!(lines[1].addr, 0x000);
        assert_eq!(lines[34_999].addr, ((0xffe + 2 * 34_999) % 4096) as u16);
        assert!(lines.iter().all(|l| usize::from(l.addr) < MEM_SIZE));
    }
}
