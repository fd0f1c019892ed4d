use std::path::{Path, PathBuf};

use slede8::{
    EmptyDevice, Line, Program, State, disassemble, listing,
};
use slede8_vga::{HEIGHT, Screen, WIDTH};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

/// Cycle limit used when none is given
const DEFAULT_CYCLE_LIMIT: u64 = 50_000;

/// SLEDE8 runner, assembler and disassembler
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a binary or assembly source file
    Run {
        /// `.s8` binary or `.asm` source
        path: PathBuf,

        /// Input tape as a hex string, e.g. `CD21`
        #[clap(short, long, default_value = "")]
        input: String,

        /// Cycle limit (0 for none)
        #[clap(short, long, default_value_t = DEFAULT_CYCLE_LIMIT)]
        limit: u64,

        /// Save the last presented frame as a PNG
        #[clap(long)]
        screenshot: Option<PathBuf>,

        /// Print each instruction as it executes
        #[clap(long)]
        trace: bool,
    },

    /// Assemble a source file into a binary
    Compile {
        /// `.asm` source
        src: PathBuf,

        /// Output path
        #[clap(short, long, default_value = "a.s8")]
        output: PathBuf,
    },

    /// Print a listing of a binary or assembly source file
    Disasm {
        /// `.s8` binary or `.asm` source
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("SLEDE8_LOG", "info")
        .write_style_or("SLEDE8_LOG", "always");
    env_logger::init_from_env(env);

    match Args::parse().command {
        Command::Run {
            path,
            input,
            limit,
            screenshot,
            trace,
        } => run(&path, &input, limit, screenshot.as_deref(), trace),
        Command::Compile { src, output } => {
            let bin = compile(&src)?;
            std::fs::write(&output, &bin)
                .with_context(|| format!("failed to write {output:?}"))?;
            info!("wrote {} bytes to {output:?}", bin.len());
            Ok(())
        }
        Command::Disasm { path } => {
            let bin = load(&path)?;
            for line in disasm(&bin)
                .with_context(|| format!("failed to load {path:?}"))?
            {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn compile(src: &Path) -> Result<Vec<u8>> {
    let text = std::fs::read_to_string(src)
        .with_context(|| format!("failed to read {src:?}"))?;
    slede8_asm::compile(&text)
        .with_context(|| format!("failed to assemble {src:?}"))
}

/// Lists the code of a `.SLEDE8` binary, after the usual load checks
fn disasm(bin: &[u8]) -> Result<Vec<Line>> {
    let program = Program::new(bin, &[], 0)?;
    let len = bin.len() - slede8::HEADER.len();
    Ok(listing(&program.image()[..len], 0))
}

/// Reads a binary, assembling it first if it's a `.asm` file
fn load(path: &Path) -> Result<Vec<u8>> {
    if path.extension().is_some_and(|e| e == "asm") {
        compile(path)
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {path:?}"))
    }
}

/// Parses a hex string like `CD21` into bytes
fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        bail!("hex input must have an even number of digits");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|b| u8::from_str_radix(b, 16).ok())
                .ok_or_else(|| anyhow!("invalid hex input {s:?}"))
        })
        .collect()
}

fn run(
    path: &Path,
    input: &str,
    limit: u64,
    screenshot: Option<&Path>,
    trace: bool,
) -> Result<()> {
    let bin = load(path)?;
    let input = parse_hex(input)?;
    let prog = Program::new(&bin, &input, limit)
        .with_context(|| format!("failed to load {path:?}"))?;
    let mut vm = prog.boot_with(EmptyDevice, Screen::new());

    let start = std::time::Instant::now();
    let result = if trace {
        loop {
            if vm.state() != State::Running {
                break Ok(());
            }
            let pc = vm.pc();
            println!("{pc:03x}: {}", disassemble(vm.ram_read_word(pc)));
            if let Err(e) = vm.step() {
                break Err(e);
            }
        }
    } else {
        vm.run()
    };
    info!(
        "{:?} after {} cycles in {:?}",
        vm.state(),
        vm.cycles(),
        start.elapsed()
    );

    let out: String = vm.output().iter().map(|b| format!("{b:02x}")).collect();
    println!("{out}");

    if let Some(p) = screenshot {
        let screen = vm.framebuffer_mut();
        if screen.frames() == 0 {
            warn!("no frame was ever presented; the screenshot will be blank");
        }
        image::RgbaImage::from_raw(
            WIDTH as u32,
            HEIGHT as u32,
            screen.frame().to_vec(),
        )
        .context("frame has the wrong size")?
        .save(p)
        .with_context(|| format!("failed to save {p:?}"))?;
    }

    result.with_context(|| format!("{path:?} failed at {:#05x}", vm.pc()))
}
