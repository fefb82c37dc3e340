use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::info;

use chip8_machine::chip8::Rom;
use chip8_machine::clock::{Session, TICKS_PER_SECOND};
use chip8_machine::config::{Settings, DEFAULT_CYCLES_PER_SECOND};
use chip8_machine::term::{Command, TerminalUi};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// A Chip-8 interpreter for the terminal.
///
/// Keypad: 1234 / QWER / ASDF / ZXCV map to 123C / 456D / 789E / A0BF.
struct Cli {
    /// The binary ROM file to run
    #[arg(value_name = "ROM")]
    rom: Option<PathBuf>,

    /// Instructions executed per second (60 to 3000)
    #[arg(long, default_value_t = DEFAULT_CYCLES_PER_SECOND)]
    cps: u32,

    /// Seed for the random number instruction, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Start paused; use '.' to single step
    #[arg(long)]
    paused: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let settings = Settings::new(args.cps, args.seed, args.paused);
    let mut session = Session::new(&settings);

    let rom_name = match &args.rom {
        Some(path) => {
            let rom = Rom::from_file(path).with_context(|| format!("loading {}", path.display()))?;
            session.load(rom);
            if settings.start_paused {
                session.toggle_pause();
            }
            path.file_name().map(|name| name.to_string_lossy().into_owned())
        }
        None => {
            if !session.is_paused() {
                session.toggle_pause();
            }
            None
        }
    };

    run(session, rom_name)
}

// Drives the session at 60 Hz until the user quits.
fn run(mut session: Session, rom_name: Option<String>) -> anyhow::Result<()> {
    let mut ui = TerminalUi::new(rom_name)?;
    ui.draw_border()?;
    if !session.has_rom() {
        ui.set_message("No ROM loaded");
    }

    let frame = Duration::from_secs(1) / TICKS_PER_SECOND;
    let mut next_frame = Instant::now() + frame;
    loop {
        for cmd in ui.poll_input(&mut session)? {
            match cmd {
                Command::Quit => {
                    info!("quit after {} instructions", session.machine().cycles());
                    return Ok(());
                }
                Command::TogglePause => {
                    let paused = session.toggle_pause();
                    ui.set_message(if paused { "Paused" } else { "Resumed" });
                }
                Command::Step => {
                    session.single_step();
                    ui.set_message("Step");
                }
                Command::Reset => {
                    session.reset();
                    ui.set_message("Reset");
                }
                Command::Restart => {
                    let msg = if session.restart() { "Restarted" } else { "No ROM loaded" };
                    ui.set_message(msg);
                }
                Command::Faster => {
                    let cps = session.faster();
                    ui.set_message(format!("Speed {cps}"));
                }
                Command::Slower => {
                    let cps = session.slower();
                    ui.set_message(format!("Speed {cps}"));
                }
            }
        }

        let report = session.run_tick();
        ui.draw(&mut session, &report)?;

        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
            next_frame += frame;
        } else {
            // fell behind, don't try to catch up
            next_frame = now + frame;
        }
    }
}
