//! SLEDE8 virtual machine
//!
//! SLEDE8 is a tiny teaching CPU: sixteen 8-bit registers, 4 KiB of memory,
//! a call stack, a single comparison flag, and 16-bit instruction words.
//! Programs read from an input tape and append to an output log; optional
//! peripherals (IO ports and a framebuffer) are attached through the
//! [`IoPorts`] and [`Framebuffer`] traits.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod disasm;
mod program;
pub mod word;

pub use disasm::{disassemble, listing, Line};
pub use program::{with_header, LoadError, Program, HEADER};

use log::{debug, trace};
use thiserror::Error;
use word::{Instruction, Reg};

/// Size of VM memory, in bytes
pub const MEM_SIZE: usize = 4096;

/// Number of general-purpose registers
pub const REG_COUNT: usize = 16;

/// Number of breakpoint slots (one per word)
pub const BREAKPOINT_SLOTS: usize = MEM_SIZE / 2;

static_assertions::const_assert_eq!(MEM_SIZE % 2, 0);

/// Externally visible execution state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// The VM can keep stepping
    Running,
    /// The program executed `STOPP`
    Stopped,
    /// The program hit a [`Fault`]
    Error,
}

/// Runtime error, which stops the VM for good
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Fault {
    /// The configured cycle limit was reached
    #[error("cycle limit ({limit}) exceeded")]
    CycleLimitExceeded {
        /// The configured limit
        limit: u64,
    },
    /// `LES` was executed with the input tape exhausted
    #[error("no more input available")]
    NoMoreInput,
    /// `RETUR` was executed with an empty call stack
    #[error("stack is empty")]
    EmptyStack,
    /// The word at the program counter isn't a valid instruction
    #[error("unsupported instruction {word:#06x} (PC {pc:#05x})")]
    Unsupported {
        /// Address of the offending word
        pc: u16,
        /// The offending word
        word: u16,
    },
}

/// Internal state; the fault lives inside so it can't exist without `Error`
#[derive(Clone, Debug)]
enum Status {
    Running,
    Stopped,
    Faulted(Fault),
}

/// Handler for the `INN` / `UT` instructions
pub trait IoPorts {
    /// Reads a byte from the port at `addr` (built from `r1:r0`)
    fn read_port(&mut self, addr: u16) -> u8;

    /// Writes a byte to the port at `addr` (built from `r1:r0`)
    fn write_port(&mut self, addr: u16, value: u8);
}

/// Handler for the `VLAST` / `VLAGR` / `VSYNK` instructions
pub trait Framebuffer {
    /// Reads a pixel at `addr` (built from `r1:r0`)
    fn read(&mut self, addr: u16) -> u8;

    /// Writes a pixel at `addr` (built from `r1:r0`)
    fn write(&mut self, addr: u16, value: u8);

    /// Presents the current frame
    fn vsync(&mut self);
}

/// Device which does nothing
///
/// Reads return 0 and writes are ignored, so programs that poke at absent
/// peripherals still run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EmptyDevice;

impl IoPorts for EmptyDevice {
    fn read_port(&mut self, _addr: u16) -> u8 {
        0
    }
    fn write_port(&mut self, _addr: u16, _value: u8) {
        // nothing to do here
    }
}

impl Framebuffer for EmptyDevice {
    fn read(&mut self, _addr: u16) -> u8 {
        0
    }
    fn write(&mut self, _addr: u16, _value: u8) {
        // nothing to do here
    }
    fn vsync(&mut self) {
        // nothing to do here
    }
}

/// The virtual machine itself
///
/// Each instance owns its memory, registers, stack, input cursor, output log
/// and peripherals.  It is built by [`Program::boot`] or
/// [`Program::boot_with`], and is never reset in place; see
/// [`Slede8::restart`].
pub struct Slede8<P = EmptyDevice, F = EmptyDevice> {
    program: Program,

    /// 4 KiB of VM memory
    ram: Box<[u8; MEM_SIZE]>,
    regs: [u8; REG_COUNT],
    pc: u16,
    flag: bool,
    /// Return addresses for `TUR` / `RETUR`
    stack: Vec<u16>,

    /// Index of the next unread byte in `program.input`
    input_pos: usize,
    output: Vec<u8>,

    cycles: u64,
    status: Status,

    /// One flag per word
    breakpoints: [bool; BREAKPOINT_SLOTS],

    ports: P,
    fb: F,
}

impl<P, F> std::fmt::Debug for Slede8<P, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slede8")
            .field("regs", &self.regs)
            .field("pc", &self.pc)
            .field("flag", &self.flag)
            .field("stack", &self.stack)
            .field("input_pos", &self.input_pos)
            .field("output", &self.output)
            .field("cycles", &self.cycles)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<P: IoPorts, F: Framebuffer> Slede8<P, F> {
    fn new(program: Program, ports: P, fb: F) -> Self {
        Self {
            ram: Box::new(*program.image()),
            program,
            regs: [0u8; REG_COUNT],
            pc: 0,
            flag: false,
            stack: vec![],
            input_pos: 0,
            output: vec![],
            cycles: 0,
            status: Status::Running,
            breakpoints: [false; BREAKPOINT_SLOTS],
            ports,
            fb,
        }
    }

    /// Builds a fresh engine from the same program, input and cycle limit
    ///
    /// The result is identical to a fresh boot: peripherals are rebuilt from
    /// their [`Default`] implementations and no breakpoints are set.
    pub fn restart(&self) -> Self
    where
        P: Default,
        F: Default,
    {
        self.program.boot_with(P::default(), F::default())
    }

    /// Executes a single instruction
    ///
    /// Stepping a stopped VM does nothing; stepping a faulted VM returns the
    /// original fault again without executing anything.
    pub fn step(&mut self) -> Result<(), Fault> {
        match &self.status {
            Status::Running => (),
            Status::Stopped => return Ok(()),
            Status::Faulted(f) => return Err(f.clone()),
        }

        let limit = self.program.cycle_limit();
        if limit > 0 && self.cycles >= limit {
            return Err(self.fail(Fault::CycleLimitExceeded { limit }));
        }

        let pc = self.pc;
        let word = self.ram_read_word(pc);
        trace!("{pc:03x}: {}", disasm::disassemble(word));

        let mut next = wrap(pc.wrapping_add(2));
        match Instruction::decode(word) {
            Instruction::Halt => {
                debug!("stopped at {pc:#05x} after {} cycles", self.cycles);
                self.status = Status::Stopped;
                return Ok(());
            }
            Instruction::SetImm { dst, val } => self.set(dst, val),
            Instruction::SetReg { dst, src } => self.set(dst, self.get(src)),
            Instruction::Finn { addr } => {
                let [lo, hi] = addr.to_le_bytes();
                self.regs[0] = lo;
                self.regs[1] = hi;
            }
            Instruction::Load { dst } => {
                let v = self.ram_read_byte(self.data_addr());
                self.set(dst, v);
            }
            Instruction::Store { src } => {
                self.ram_write_byte(self.data_addr(), self.get(src));
            }
            Instruction::FbLoad { dst } => {
                let addr = self.data_addr();
                let v = self.fb.read(addr);
                self.set(dst, v);
            }
            Instruction::FbStore { src } => {
                let addr = self.data_addr();
                let v = self.get(src);
                self.fb.write(addr, v);
            }
            Instruction::Alu { op, dst, src } => {
                self.set(dst, op.apply(self.get(dst), self.get(src)));
            }
            Instruction::Read { dst } => {
                let Some(&v) = self.program.input().get(self.input_pos) else {
                    return Err(self.fail(Fault::NoMoreInput));
                };
                self.input_pos += 1;
                self.set(dst, v);
            }
            Instruction::Write { src } => {
                let v = self.get(src);
                self.output.push(v);
            }
            Instruction::PortIn { dst } => {
                let addr = self.data_addr();
                let v = self.ports.read_port(addr);
                self.set(dst, v);
            }
            Instruction::PortOut { src } => {
                let addr = self.data_addr();
                let v = self.get(src);
                self.ports.write_port(addr, v);
            }
            Instruction::VSync => self.fb.vsync(),
            Instruction::Cmp { op, a, b } => {
                self.flag = op.test(self.get(a), self.get(b));
            }
            Instruction::Jump { addr } => next = addr,
            Instruction::JumpIf { addr } => {
                if self.flag {
                    next = addr;
                }
            }
            Instruction::Call { addr } => {
                self.stack.push(next);
                next = addr;
            }
            Instruction::Ret => {
                let Some(addr) = self.stack.pop() else {
                    return Err(self.fail(Fault::EmptyStack));
                };
                next = addr;
            }
            Instruction::Nop => (),
            Instruction::Unsupported(word) => {
                return Err(self.fail(Fault::Unsupported { pc, word }));
            }
        }

        self.pc = wrap(next);
        self.cycles += 1;
        Ok(())
    }

    /// Runs until the VM stops, faults, or reaches a breakpoint
    ///
    /// Breakpoints are checked *after* each step, so calling `run` while
    /// sitting on a breakpoint executes at least one instruction before
    /// stopping at the next one.
    pub fn run(&mut self) -> Result<(), Fault> {
        loop {
            self.step()?;
            if !self.is_running() {
                return Ok(());
            }
            if self.breakpoint(self.pc) {
                debug!("breakpoint at {:#05x}", self.pc);
                return Ok(());
            }
        }
    }

    fn fail(&mut self, f: Fault) -> Fault {
        debug!("fault at {:#05x}: {f}", self.pc);
        self.status = Status::Faulted(f.clone());
        f
    }
}

impl<P, F> Slede8<P, F> {
    #[inline]
    fn get(&self, r: Reg) -> u8 {
        self.regs[r.index()]
    }

    #[inline]
    fn set(&mut self, r: Reg, v: u8) {
        self.regs[r.index()] = v;
    }

    /// Address built from `r1:r0`, used by load / store and peripherals
    #[inline]
    fn data_addr(&self) -> u16 {
        u16::from_le_bytes([self.regs[0], self.regs[1]])
    }

    /// Returns the current state
    pub fn state(&self) -> State {
        match self.status {
            Status::Running => State::Running,
            Status::Stopped => State::Stopped,
            Status::Faulted(..) => State::Error,
        }
    }

    /// Checks whether the VM can keep stepping
    pub fn is_running(&self) -> bool {
        matches!(self.status, Status::Running)
    }

    /// Returns the fault that stopped the VM, if any
    pub fn fault(&self) -> Option<&Fault> {
        match &self.status {
            Status::Faulted(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the program this VM was booted from
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Reads a register
    ///
    /// # Panics
    /// If `i >= 16`
    pub fn reg(&self, i: u8) -> u8 {
        self.get(Reg::new(i))
    }

    /// Writes a register
    ///
    /// # Panics
    /// If `i >= 16`
    pub fn set_reg(&mut self, i: u8, v: u8) {
        self.set(Reg::new(i), v)
    }

    /// Shared borrow of the register file
    pub fn regs(&self) -> &[u8; REG_COUNT] {
        &self.regs
    }

    /// Returns the program counter
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Returns the comparison flag
    pub fn flag(&self) -> bool {
        self.flag
    }

    /// Returns the number of executed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns the cycle limit, or 0 if unlimited
    pub fn cycle_limit(&self) -> u64 {
        self.program.cycle_limit()
    }

    /// Shared borrow of the entire RAM array
    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }

    /// Reads a byte from RAM, wrapping the address
    #[inline]
    pub fn ram_read_byte(&self, addr: u16) -> u8 {
        self.ram[usize::from(wrap(addr))]
    }

    /// Writes a byte to RAM, wrapping the address
    #[inline]
    pub fn ram_write_byte(&mut self, addr: u16, v: u8) {
        self.ram[usize::from(wrap(addr))] = v;
    }

    /// Reads a little-endian word from RAM
    ///
    /// If the address is at the top of RAM, the second byte wraps to 0
    #[inline]
    pub fn ram_read_word(&self, addr: u16) -> u16 {
        let lo = self.ram_read_byte(addr);
        let hi = self.ram_read_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Returns the call stack, oldest return address first
    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    /// Returns the full input tape
    pub fn input(&self) -> &[u8] {
        self.program.input()
    }

    /// Returns the input bytes that haven't been read yet
    pub fn input_remaining(&self) -> &[u8] {
        &self.program.input()[self.input_pos..]
    }

    /// Returns everything written by `SKRIV` so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Toggles the breakpoint covering the word at `addr`
    pub fn toggle_breakpoint(&mut self, addr: u16) {
        let b = &mut self.breakpoints[breakpoint_slot(addr)];
        *b = !*b;
    }

    /// Checks whether a breakpoint covers the word at `addr`
    pub fn breakpoint(&self, addr: u16) -> bool {
        self.breakpoints[breakpoint_slot(addr)]
    }

    /// Shared borrow of the IO port handler
    pub fn ports(&self) -> &P {
        &self.ports
    }

    /// Mutable borrow of the IO port handler
    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    /// Shared borrow of the framebuffer handler
    pub fn framebuffer(&self) -> &F {
        &self.fb
    }

    /// Mutable borrow of the framebuffer handler
    pub fn framebuffer_mut(&mut self) -> &mut F {
        &mut self.fb
    }
}

/// Wraps an address into VM memory
#[inline]
fn wrap(addr: u16) -> u16 {
    addr % MEM_SIZE as u16
}

#[inline]
fn breakpoint_slot(addr: u16) -> usize {
    usize::from(wrap(addr) >> 1)
}
