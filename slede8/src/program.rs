use crate::{EmptyDevice, Framebuffer, IoPorts, Slede8, MEM_SIZE};
use log::debug;
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Magic bytes at the start of every SLEDE8 binary
pub const HEADER: &[u8; 7] = b".SLEDE8";

#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct Header {
    magic: [u8; 7],
}

static_assertions::assert_eq_size!(Header, [u8; 7]);

/// Error returned when a binary can't be loaded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The binary doesn't start with [`HEADER`]
    #[error("expected {} header", String::from_utf8_lossy(HEADER))]
    BadHeader,

    /// The code doesn't fit in memory
    #[error("program size ({size}) exceeds memory limit ({limit})")]
    TooLarge {
        /// Size of the code, in bytes, excluding the header
        size: usize,
        /// Memory size
        limit: usize,
    },
}

/// A loaded program, along with everything needed to boot it
///
/// This is the unit of restarting: an engine never resets in place, but is
/// rebuilt from its `Program`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    image: Box<[u8; MEM_SIZE]>,
    input: Vec<u8>,
    cycle_limit: u64,
}

impl Program {
    /// Loads a binary (header followed by the memory image)
    ///
    /// `cycle_limit` of 0 means no limit.
    pub fn new(
        binary: &[u8],
        input: &[u8],
        cycle_limit: u64,
    ) -> Result<Self, LoadError> {
        let Ok((header, code)) = Header::ref_from_prefix(binary) else {
            return Err(LoadError::BadHeader);
        };
        if &header.magic != HEADER {
            return Err(LoadError::BadHeader);
        }
        Self::from_image(code, input, cycle_limit)
    }

    /// Builds a program from a raw memory image, without a header
    ///
    /// Memory past the end of `code` is zero-filled.
    pub fn from_image(
        code: &[u8],
        input: &[u8],
        cycle_limit: u64,
    ) -> Result<Self, LoadError> {
        if code.len() > MEM_SIZE {
            return Err(LoadError::TooLarge {
                size: code.len(),
                limit: MEM_SIZE,
            });
        }
        let mut image = Box::new([0u8; MEM_SIZE]);
        image[..code.len()].copy_from_slice(code);
        debug!(
            "loaded {} bytes of code, {} bytes of input, cycle limit {}",
            code.len(),
            input.len(),
            cycle_limit
        );
        Ok(Self {
            image,
            input: input.to_vec(),
            cycle_limit,
        })
    }

    /// Returns the initial memory image
    pub fn image(&self) -> &[u8; MEM_SIZE] {
        &self.image
    }

    /// Returns the input tape
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Returns the cycle limit, or 0 if unlimited
    pub fn cycle_limit(&self) -> u64 {
        self.cycle_limit
    }

    /// Builds a fresh engine with no peripherals attached
    pub fn boot(&self) -> Slede8 {
        self.boot_with(EmptyDevice, EmptyDevice)
    }

    /// Builds a fresh engine with the given peripherals
    pub fn boot_with<P: IoPorts, F: Framebuffer>(
        &self,
        ports: P,
        fb: F,
    ) -> Slede8<P, F> {
        Slede8::new(self.clone(), ports, fb)
    }
}

/// Prepends [`HEADER`] to a memory image, producing a loadable binary
pub fn with_header(code: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER.len() + code.len());
    out.extend_from_slice(HEADER);
    out.extend_from_slice(code);
    out
}
