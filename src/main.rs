//! LC-3 Emulator - CLI Entry Point
//!
//! `lc3-emu <image>` loads an object image and runs it on the terminal.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};

use lc3::cpu::Snapshot;
use lc3::{ConsoleDevice, Cpu, CpuConfig, CpuError, Image, StreamConsole, TerminalConsole};

#[derive(Parser)]
#[command(name = "lc3-emu")]
#[command(version)]
#[command(about = "An emulator of the LC-3 16-bit instructional computer")]
struct Cli {
    /// Path to the LC-3 object image to run
    image: PathBuf,

    /// How long a keyboard status read waits for input, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_timeout_ms: u64,

    /// Print the final machine state as JSON on stderr
    #[arg(long)]
    dump_state: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let image = match Image::load(&cli.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let config = CpuConfig {
        keyboard_poll_timeout: Duration::from_millis(cli.poll_timeout_ms),
        ..CpuConfig::default()
    };

    // The terminal is back in its original mode once this returns.
    let (result, snapshot) = match TerminalConsole::open() {
        Ok(console) => run_image(&image, config, console),
        Err(e) => {
            info!("no interactive terminal ({}), using stdin and stdout", e);
            run_image(&image, config, StreamConsole::stdio())
        }
    };

    if cli.dump_state {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("error: failed to serialize state: {}", e),
        }
    }

    match result {
        Ok(_) => {}
        Err(CpuError::Interrupted) => {
            println!();
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_image<C: ConsoleDevice>(
    image: &Image,
    config: CpuConfig,
    console: C,
) -> (Result<u64, CpuError>, Snapshot) {
    let mut cpu = Cpu::with_config(console, config);
    let loaded = cpu.load_image(image);
    debug!("loaded {} of {} words, {:?}", loaded, image.len(), cpu.config());

    let result = cpu.run();

    if let Err(e) = cpu.console.restore() {
        warn!("failed to restore console: {}", e);
    }
    (result, cpu.snapshot())
}
