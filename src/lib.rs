//! A CHIP-8 interpreter core plus the pieces a front end needs to drive it:
//! frame pacing, keypad mapping, a disassembler and a terminal adapter.

pub mod chip8;
pub mod clock;
pub mod config;
pub mod disasm;
pub mod error;
pub mod keypad;
pub mod term;

pub use chip8::{Chip8, Registers, Rom};
pub use error::Chip8Error;
