//! Turns Chip8 instruction words into assembler-style mnemonics.

use std::fmt;

/// Returns the mnemonic for one instruction word.
///
/// Words the interpreter treats as no-ops because they are undefined come
/// back as `DATA 0xWXYZ`.
pub fn disassemble(word: u16) -> String {
    let [a, b] = word.to_be_bytes();
    let x = a & 0x0F;
    let y = b >> 4;
    let n = b & 0x0F;
    let nnn = word & 0x0FFF;

    match (a >> 4, b) {
        (0x0, _) if word == 0x00E0 => "CLS".to_string(),
        (0x0, _) if word == 0x00EE => "RET".to_string(),
        (0x0, _) => format!("SYS {nnn:#05X}"),
        (0x1, _) => format!("JP {nnn:#05X}"),
        (0x2, _) => format!("CALL {nnn:#05X}"),
        (0x3, kk) => format!("SE V{x:X}, {kk:#04X}"),
        (0x4, kk) => format!("SNE V{x:X}, {kk:#04X}"),
        (0x5, _) if n == 0 => format!("SE V{x:X}, V{y:X}"),
        (0x6, kk) => format!("LD V{x:X}, {kk:#04X}"),
        (0x7, kk) => format!("ADD V{x:X}, {kk:#04X}"),
        (0x8, _) => match n {
            0x0 => format!("LD V{x:X}, V{y:X}"),
            0x1 => format!("OR V{x:X}, V{y:X}"),
            0x2 => format!("AND V{x:X}, V{y:X}"),
            0x3 => format!("XOR V{x:X}, V{y:X}"),
            0x4 => format!("ADD V{x:X}, V{y:X}"),
            0x5 => format!("SUB V{x:X}, V{y:X}"),
            0x6 => format!("SHR V{x:X}, V{y:X}"),
            0x7 => format!("SUBN V{x:X}, V{y:X}"),
            0xE => format!("SHL V{x:X}, V{y:X}"),
            _ => data(word),
        },
        (0x9, _) if n == 0 => format!("SNE V{x:X}, V{y:X}"),
        (0xA, _) => format!("LD I, {nnn:#05X}"),
        (0xB, _) => format!("JP V0, {nnn:#05X}"),
        (0xC, kk) => format!("RND V{x:X}, {kk:#04X}"),
        (0xD, _) => format!("DRW V{x:X}, V{y:X}, {n}"),
        (0xE, 0x9E) => format!("SKP V{x:X}"),
        (0xE, 0xA1) => format!("SKNP V{x:X}"),
        (0xF, 0x07) => format!("LD V{x:X}, DT"),
        (0xF, 0x0A) => format!("LD V{x:X}, K"),
        (0xF, 0x15) => format!("LD DT, V{x:X}"),
        (0xF, 0x18) => format!("LD ST, V{x:X}"),
        (0xF, 0x1E) => format!("ADD I, V{x:X}"),
        (0xF, 0x29) => format!("LD F, V{x:X}"),
        (0xF, 0x33) => format!("LD B, V{x:X}"),
        (0xF, 0x55) => format!("LD [I], V{x:X}"),
        (0xF, 0x65) => format!("LD V{x:X}, [I]"),
        _ => data(word),
    }
}

fn data(word: u16) -> String {
    format!("DATA {word:#06X}")
}

/// One disassembled word of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub addr: u16,
    /// The raw bytes; a trailing odd byte is a single-element vec.
    pub bytes: Vec<u8>,
    pub text: String,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw: String = self.bytes.iter().map(|b| format!("{b:02X}")).collect();
        write!(f, "{:#05X}: {raw:<4}  {}", self.addr, self.text)
    }
}

/// Disassembles `code` two bytes at a time, as if loaded at `origin`.
///
/// Addresses wrap at 0xFFFF, so input longer than 64 KiB reuses addresses.
pub fn disassemble_rom(code: &[u8], origin: u16) -> Vec<Line> {
    let mut next = origin;
    code.chunks(2)
        .map(|chunk| {
            let addr = next;
            next = next.wrapping_add(2);
            let text = match *chunk {
                [a, b] => disassemble(u16::from_be_bytes([a, b])),
                [a] => format!("DATA {a:#04X}"),
                _ => unreachable!("chunks(2) yields one or two bytes"),
            };
            Line { addr, bytes: chunk.to_vec(), text }
        })
        .collect()
}
