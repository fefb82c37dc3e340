use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use chip8_machine::chip8::Rom;
use chip8_machine::disasm::disassemble_rom;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// A Chip-8 disassembler.
struct Cli {
    /// The binary ROM file to disassemble
    #[arg(long, value_name = "BINARY")]
    rom: PathBuf,

    /// Address the listing starts at
    #[arg(long, default_value = "0x200", value_parser = parse_addr)]
    origin: u16,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("not a hex address: {e}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let rom = Rom::from_file(&args.rom).with_context(|| format!("loading {}", args.rom.display()))?;
    for line in disassemble_rom(&rom, args.origin) {
        println!("{line}");
    }
    Ok(())
}
