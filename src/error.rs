use std::io;

/// Errors reported by the Chip8 library.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM size incorrect. Max size is {max} bytes but {size} bytes were provided")]
    RomTooLarge { size: usize, max: usize },

    #[error("error reading Chip8 ROM: {0}")]
    Io(#[from] io::Error),
}
