//! Headless framebuffer peripheral for SLEDE8
//!
//! The screen is 256×256 pixels, each holding an index into a 256-entry RGB
//! palette.  A pixel address packs the column into the low byte and the row
//! into the high byte, so every 16-bit address is on-screen.
//!
//! Writes land in a back buffer; [`vsync`](Framebuffer::vsync) copies it into
//! the presented frame, which is what [`Screen::frame`] renders.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use log::trace;
use slede8::Framebuffer;

/// Screen width, in pixels
pub const WIDTH: usize = 256;

/// Screen height, in pixels
pub const HEIGHT: usize = 256;

const PIXELS: usize = WIDTH * HEIGHT;

static_assertions::const_assert_eq!(PIXELS, u16::MAX as usize + 1);

/// The 16 CGA colors
const CGA: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00],
    [0x00, 0x00, 0xaa],
    [0x00, 0xaa, 0x00],
    [0x00, 0xaa, 0xaa],
    [0xaa, 0x00, 0x00],
    [0xaa, 0x00, 0xaa],
    [0xaa, 0x55, 0x00],
    [0xaa, 0xaa, 0xaa],
    [0x55, 0x55, 0x55],
    [0x55, 0x55, 0xff],
    [0x55, 0xff, 0x55],
    [0x55, 0xff, 0xff],
    [0xff, 0x55, 0x55],
    [0xff, 0x55, 0xff],
    [0xff, 0xff, 0x55],
    [0xff, 0xff, 0xff],
];

/// Channel levels for the 6×6×6 color cube
const CUBE: [u8; 6] = [0x00, 0x33, 0x66, 0x99, 0xcc, 0xff];

/// Builds the power-on palette
///
/// Entries 0-15 are the CGA colors, 16-231 a 6×6×6 color cube (index
/// `16 + 36 r + 6 g + b`), and 232-255 a grey ramp.  Anything left over is
/// black.
pub fn default_palette() -> [[u8; 3]; 256] {
    let mut out = [[0u8; 3]; 256];
    let cube = (0..216).map(|i| [CUBE[i / 36], CUBE[(i / 6) % 6], CUBE[i % 6]]);
    let grey = (0..24u8).map(|i| [8 + i * 10; 3]);
    for (o, c) in out.iter_mut().zip(CGA.into_iter().chain(cube).chain(grey))
    {
        *o = c;
    }
    out
}

/// A headless screen
pub struct Screen {
    /// Back buffer, written by the guest
    pixels: Box<[u8; PIXELS]>,

    /// Last frame latched by `vsync`
    presented: Box<[u8; PIXELS]>,

    palette: [[u8; 3]; 256],

    /// Local buffer for rendered RGBA values
    buffer: Vec<u8>,

    /// Flag indicating whether `buffer` should be recalculated
    changed: bool,

    frames: u64,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl Screen {
    /// Builds a black screen with the default palette
    pub fn new() -> Self {
        Self {
            pixels: Box::new([0; PIXELS]),
            presented: Box::new([0; PIXELS]),
            palette: default_palette(),
            buffer: vec![0; PIXELS * 4],
            changed: true,
            frames: 0,
        }
    }

    /// Returns the palette index at the given position in the back buffer
    pub fn pixel(&self, x: u8, y: u8) -> u8 {
        self.pixels[index(x, y)]
    }

    /// Returns the palette index at the given position in the presented frame
    pub fn presented(&self, x: u8, y: u8) -> u8 {
        self.presented[index(x, y)]
    }

    /// Returns a palette entry as RGB
    pub fn palette(&self, i: u8) -> [u8; 3] {
        self.palette[usize::from(i)]
    }

    /// Replaces a palette entry
    pub fn set_palette(&mut self, i: u8, rgb: [u8; 3]) {
        self.palette[usize::from(i)] = rgb;
        self.changed = true;
    }

    /// Returns the number of frames presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Renders the presented frame as RGBA8, row-major
    pub fn frame(&mut self) -> &[u8] {
        if self.changed {
            for (&p, o) in self.presented.iter().zip(self.buffer.chunks_mut(4))
            {
                let [r, g, b] = self.palette[usize::from(p)];
                o.copy_from_slice(&[r, g, b, 0xff]);
            }
            self.changed = false;
        }
        &self.buffer
    }
}

fn index(x: u8, y: u8) -> usize {
    usize::from(u16::from_le_bytes([x, y]))
}

impl Framebuffer for Screen {
    fn read(&mut self, addr: u16) -> u8 {
        self.pixels[usize::from(addr)]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.pixels[usize::from(addr)] = value;
    }

    fn vsync(&mut self) {
        self.presented.copy_from_slice(&self.pixels[..]);
        self.frames += 1;
        self.changed = true;
        trace!("vsync: frame {}", self.frames);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn palette() {
        let p = default_palette();
        assert_eq!(p[0], [0, 0, 0]);
        assert_eq!(p[6], [0xaa, 0x55, 0x00]);
        assert_eq!(p[15], [0xff; 3]);
        assert_eq!(p[16], [0, 0, 0]);
        assert_eq!(p[16 + 36 * 5], [0xff, 0, 0]);
        assert_eq!(p[16 + 6 * 5], [0, 0xff, 0]);
        assert_eq!(p[16 + 5], [0, 0, 0xff]);
        assert_eq!(p[231], [0xff; 3]);
        assert_eq!(p[232], [8; 3]);
        assert_eq!(p[255], [238; 3]);
    }

    #[test]
    fn addressing() {
        let mut s = Screen::new();
        s.write(0x1234, 7);
        assert_eq!(s.pixel(0x34, 0x12), 7);
        assert_eq!(s.read(0x1234), 7);
        s.write(0xffff, 9);
        assert_eq!(s.pixel(255, 255), 9);
    }

    #[test]
    fn vsync_latches() {
        let mut s = Screen::new();
        s.write(0x0001, 15);
        assert_eq!(s.presented(1, 0), 0);
        assert_eq!(&s.frame()[4..8], &[0, 0, 0, 0xff]);

        s.vsync();
        assert_eq!(s.frames(), 1);
        assert_eq!(s.presented(1, 0), 15);
        assert_eq!(&s.frame()[4..8], &[0xff, 0xff, 0xff, 0xff]);

        // Later writes don't show up until the next vsync
        s.write(0x0001, 1);
        assert_eq!(&s.frame()[4..8], &[0xff, 0xff, 0xff, 0xff]);

        s.set_palette(15, [1, 2, 3]);
        assert_eq!(&s.frame()[4..8], &[1, 2, 3, 0xff]);
    }
}
