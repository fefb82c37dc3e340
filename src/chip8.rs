use std::fs;
use std::ops::Deref;
use std::path::Path;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Chip8Error;

/// Number of bytes in the Chip8's memory.
pub const MEM_BYTES: usize = 4096;
/// Address the program is loaded at.
pub const PROGRAM_START: u16 = 0x200;
/// Maximum allowed bytes of a user's ROM.
pub const MAX_ROM_BYTES: usize = MEM_BYTES - PROGRAM_START as usize;
/// Address of the built-in hex font.
pub const FONT_START: u16 = 0x050;
/// Display width in pixels.
pub const DISPLAY_WIDTH: usize = 64;
/// Display height in pixels.
pub const DISPLAY_HEIGHT: usize = 32;

// pc and I only ever hold 12 significant bits.
const ADDR_MASK: u16 = 0x0FFF;

/// The 16 hex digit glyphs, 5 bytes each.
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// A 64x32 grid of pixels, each 0 or 1, indexed `[y][x]`.
pub type Display = [[u8; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

/// A copy of the Chip8's register file, for debuggers and inspectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub v: [u8; 16],
    pub index: u16,
    pub pc: u16,
    pub sp: u8,
    pub dt: u8,
    pub st: u8,
    pub cycles: u64,
}

/// A Chip8 interpreter.
///
/// The machine does no timing of its own. A driver calls [`Chip8::step`] as
/// many times per 60 Hz frame as the desired speed requires, then
/// [`Chip8::tick_timers`] once.
///
/// The call stack is a 16 slot ring: `sp` wraps on overflow and underflow
/// instead of trapping, which stricter interpreters would reject.
#[derive(Debug)]
pub struct Chip8 {
    memory: [u8; MEM_BYTES],
    registers: [u8; 16],
    stack: [u16; 16],
    pc: u16,
    index: u16,
    dt: u8,
    st: u8,
    sp: u8,
    keys: [bool; 16],
    waiting_for_key: Option<u8>,
    display: Display,
    draw_flag: bool,
    cycles: u64,
    rng: StdRng,
}

impl Chip8 {
    /// Returns a new Chip8 interpreter in the reset state, with `Cxkk` seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Returns a new Chip8 interpreter whose random numbers are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEM_BYTES],
            registers: [0; 16],
            stack: [0; 16],
            pc: PROGRAM_START,
            index: 0,
            dt: 0,
            st: 0,
            sp: 0,
            keys: [false; 16],
            waiting_for_key: None,
            display: [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            draw_flag: true,
            cycles: 0,
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Clears memory, registers, timers, keys and display, and reloads the font.
    pub fn reset(&mut self) {
        self.memory.fill(0);
        let font = FONT_START as usize;
        self.memory[font..font + FONT.len()].copy_from_slice(&FONT);
        self.registers = [0; 16];
        self.stack = [0; 16];
        self.pc = PROGRAM_START;
        self.index = 0;
        self.dt = 0;
        self.st = 0;
        self.sp = 0;
        self.keys = [false; 16];
        self.waiting_for_key = None;
        self.display = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
        self.draw_flag = true;
        self.cycles = 0;
        debug!("machine reset");
    }

    /// Resets the machine and copies `code` to 0x200.
    ///
    /// Returns Err without touching the machine if `code.len() > MAX_ROM_BYTES`.
    pub fn load_rom(&mut self, code: &[u8]) -> Result<(), Chip8Error> {
        check_rom_size(code.len())?;
        self.load_unchecked(code);
        Ok(())
    }

    /// Resets the machine and loads an already validated ROM.
    pub fn load(&mut self, rom: &Rom) {
        self.load_unchecked(rom);
    }

    fn load_unchecked(&mut self, code: &[u8]) {
        self.reset();
        let start = PROGRAM_START as usize;
        self.memory[start..start + code.len()].copy_from_slice(code);
        debug!("loaded {} byte ROM at {:#05X}", code.len(), PROGRAM_START);
    }

    /// Updates the state of hex key `index`. Indices above 0xF are ignored.
    ///
    /// A press while an `Fx0A` is pending stores the key in the waiting
    /// register and lets execution continue.
    pub fn set_key(&mut self, index: usize, pressed: bool) {
        if index >= self.keys.len() {
            return;
        }
        self.keys[index] = pressed;
        if pressed {
            if let Some(reg) = self.waiting_for_key.take() {
                self.registers[reg as usize] = index as u8;
                trace!("key {index:X} resolved wait on V{reg:X}");
            }
        }
    }

    /// Executes a single instruction.
    ///
    /// Does nothing, and does not count a cycle, while an `Fx0A` is waiting for a key.
    pub fn step(&mut self) {
        if self.waiting_for_key.is_some() {
            return;
        }
        let pc = self.pc;
        let instr = self.fetch();
        self.cycles += 1;
        trace!("{pc:#05X}: {:02X}{:02X}", instr[0], instr[1]);
        self.execute(instr);
    }

    /// Decrements the delay and sound timers, stopping at zero. Call once per 60 Hz frame.
    pub fn tick_timers(&mut self) {
        self.dt = self.dt.saturating_sub(1);
        self.st = self.st.saturating_sub(1);
    }

    // Fetches the instruction at pc and moves pc past it.
    fn fetch(&mut self) -> [u8; 2] {
        let pc = self.pc;
        let instr = [self.read(pc), self.read(pc + 1)];
        self.pc = (pc + 2) & ADDR_MASK;
        instr
    }

    fn read(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDR_MASK) as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.memory[(addr & ADDR_MASK) as usize] = val;
    }

    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = (self.pc + 2) & ADDR_MASK;
        }
    }

    fn execute(&mut self, instr: [u8; 2]) {
        let [a, b] = instr;
        let regx = (a & 0x0F) as usize;
        let regy = ((b & 0xF0) >> 4) as usize;
        let nnn = u16::from_be_bytes([a & 0x0F, b]);

        match instr {
            // clear display, 00E0
            [0x00, 0xE0] => {
                self.display = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
                self.draw_flag = true;
            }

            // return from subroutine, 00EE
            [0x00, 0xEE] => {
                self.sp = self.sp.wrapping_sub(1) & 0x0F;
                self.pc = self.stack[self.sp as usize];
            }

            // jump to nnn, 1nnn
            [a, _] if a & 0xF0 == 0x10 => {
                self.pc = nnn;
            }

            // call subroutine at nnn, 2nnn
            [a, _] if a & 0xF0 == 0x20 => {
                self.stack[self.sp as usize] = self.pc;
                self.sp = (self.sp + 1) & 0x0F;
                self.pc = nnn;
            }

            // skip if Vx == kk, 3xkk
            [a, b] if a & 0xF0 == 0x30 => {
                self.skip_if(self.registers[regx] == b);
            }

            // skip if Vx != kk, 4xkk
            [a, b] if a & 0xF0 == 0x40 => {
                self.skip_if(self.registers[regx] != b);
            }

            // skip if Vx == Vy, 5xy0
            [a, b] if a & 0xF0 == 0x50 && b & 0x0F == 0 => {
                self.skip_if(self.registers[regx] == self.registers[regy]);
            }

            // set register, 6xkk
            [a, b] if a & 0xF0 == 0x60 => {
                self.registers[regx] = b;
            }

            // wrapping add to register, VF untouched, 7xkk
            [a, b] if a & 0xF0 == 0x70 => {
                self.registers[regx] = self.registers[regx].wrapping_add(b);
            }

            [a, b] if a & 0xF0 == 0x80 => self.execute_alu(regx, regy, b & 0x0F),

            // skip if Vx != Vy, 9xy0
            [a, b] if a & 0xF0 == 0x90 && b & 0x0F == 0 => {
                self.skip_if(self.registers[regx] != self.registers[regy]);
            }

            // set index register to nnn, Annn
            [a, _] if a & 0xF0 == 0xA0 => {
                self.index = nnn;
            }

            // jump to V0 + nnn, Bnnn
            [a, _] if a & 0xF0 == 0xB0 => {
                self.pc = (nnn + self.registers[0x00] as u16) & ADDR_MASK;
            }

            // Vx = random & kk, Cxkk
            [a, b] if a & 0xF0 == 0xC0 => {
                let r: u8 = self.rng.gen();
                self.registers[regx] = r & b;
            }

            // draw n rows at Vx,Vy, Dxyn
            [a, b] if a & 0xF0 == 0xD0 => {
                let x = self.registers[regx];
                let y = self.registers[regy];
                let collision = self.draw_sprite(x, y, b & 0x0F);
                self.registers[0x0F] = collision as u8;
            }

            // skip if key Vx pressed, Ex9E
            [a, 0x9E] if a & 0xF0 == 0xE0 => {
                let key = (self.registers[regx] & 0x0F) as usize;
                self.skip_if(self.keys[key]);
            }

            // skip if key Vx not pressed, ExA1
            [a, 0xA1] if a & 0xF0 == 0xE0 => {
                let key = (self.registers[regx] & 0x0F) as usize;
                self.skip_if(!self.keys[key]);
            }

            [a, b] if a & 0xF0 == 0xF0 => self.execute_misc(regx, b),

            // 0nnn and anything undefined
            _ => {}
        }
    }

    // The 8xyN register-to-register group. VF is written before Vx, so when
    // x is F the result wins over the flag.
    fn execute_alu(&mut self, regx: usize, regy: usize, op: u8) {
        let regs = &mut self.registers;
        match op {
            // Vx = Vy
            0x0 => regs[regx] = regs[regy],
            // Vx |= Vy
            0x1 => regs[regx] |= regs[regy],
            // Vx &= Vy
            0x2 => regs[regx] &= regs[regy],
            // Vx ^= Vy
            0x3 => regs[regx] ^= regs[regy],
            // Vx += Vy, VF = carry
            0x4 => {
                let res = regs[regx] as u16 + regs[regy] as u16;
                regs[0x0F] = (res > 0xFF) as u8;
                regs[regx] = (res & 0x00FF) as u8;
            }
            // Vx -= Vy, VF = no borrow
            0x5 => {
                regs[0x0F] = (regs[regx] >= regs[regy]) as u8;
                regs[regx] = regs[regx].wrapping_sub(regs[regy]);
            }
            // Vx >>= 1, VF = old LSB. Shifts Vx itself, Vy is ignored.
            0x6 => {
                regs[0x0F] = regs[regx] & 0x01;
                regs[regx] >>= 1;
            }
            // Vx = Vy - Vx, VF = no borrow
            0x7 => {
                regs[0x0F] = (regs[regy] >= regs[regx]) as u8;
                regs[regx] = regs[regy].wrapping_sub(regs[regx]);
            }
            // Vx <<= 1, VF = old MSB
            0xE => {
                regs[0x0F] = (regs[regx] >> 7) & 0x01;
                regs[regx] <<= 1;
            }
            _ => {}
        }
    }

    // The Fxkk group: timers, keys, index register and memory transfers.
    fn execute_misc(&mut self, regx: usize, kk: u8) {
        match kk {
            // Vx = dt
            0x07 => self.registers[regx] = self.dt,
            // block until a key press lands in Vx
            0x0A => {
                self.waiting_for_key = Some(regx as u8);
                trace!("waiting for key into V{regx:X}");
            }
            // dt = Vx
            0x15 => self.dt = self.registers[regx],
            // st = Vx
            0x18 => self.st = self.registers[regx],
            // I += Vx, VF = overflow past 0xFFF
            0x1E => {
                let res = self.index + self.registers[regx] as u16;
                self.registers[0x0F] = (res > ADDR_MASK) as u8;
                self.index = res & ADDR_MASK;
            }
            // I = glyph for hex digit Vx
            0x29 => {
                let digit = (self.registers[regx] & 0x0F) as u16;
                self.index = (FONT_START + digit * 5) & ADDR_MASK;
            }
            // mem[I..I+2] = BCD of Vx
            0x33 => {
                let val = self.registers[regx];
                let i = self.index;
                self.write(i, val / 100);
                self.write(i + 1, (val / 10) % 10);
                self.write(i + 2, val % 10);
            }
            // mem[I..=I+x] = V0..=Vx, I += x + 1
            0x55 => {
                for reg in 0..=regx {
                    self.write(self.index + reg as u16, self.registers[reg]);
                }
                self.index = (self.index + regx as u16 + 1) & ADDR_MASK;
            }
            // V0..=Vx = mem[I..=I+x], I += x + 1
            0x65 => {
                for reg in 0..=regx {
                    self.registers[reg] = self.read(self.index + reg as u16);
                }
                self.index = (self.index + regx as u16 + 1) & ADDR_MASK;
            }
            _ => {}
        }
    }

    // XORs an n-row sprite from memory[I] onto the display, wrapping at the
    // edges. Returns true if any lit pixel was switched off.
    fn draw_sprite(&mut self, x: u8, y: u8, rows: u8) -> bool {
        let mut collision = false;
        for row in 0..rows as u16 {
            let sprite_row = self.read(self.index + row);
            let drawy = (y as usize + row as usize) % DISPLAY_HEIGHT;
            for bit in 0..8 {
                if sprite_row & (0x80 >> bit) == 0 {
                    continue;
                }
                let drawx = (x as usize + bit) % DISPLAY_WIDTH;
                let pixel = &mut self.display[drawy][drawx];
                if *pixel == 0x01 {
                    collision = true;
                }
                *pixel ^= 0x01;
            }
        }
        self.draw_flag = true;
        collision
    }

    /// The framebuffer, indexed `[y][x]`.
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Whether pixel (x, y) is lit. Out of range coordinates are never lit.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        y < DISPLAY_HEIGHT && x < DISPLAY_WIDTH && self.display[y][x] == 0x01
    }

    /// True if the display changed since the presentation layer last cleared the flag.
    pub fn draw_flag(&self) -> bool {
        self.draw_flag
    }

    /// Marks the display as presented.
    pub fn clear_draw_flag(&mut self) {
        self.draw_flag = false;
    }

    /// Requests a redraw even though the display did not change.
    pub fn force_redraw(&mut self) {
        self.draw_flag = true;
    }

    /// Returns a snapshot of the register file.
    pub fn registers(&self) -> Registers {
        Registers {
            v: self.registers,
            index: self.index,
            pc: self.pc,
            sp: self.sp,
            dt: self.dt,
            st: self.st,
            cycles: self.cycles,
        }
    }

    /// The full 4K of memory.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// The register an `Fx0A` is waiting to fill, if any.
    pub fn waiting_for_key(&self) -> Option<u8> {
        self.waiting_for_key
    }

    /// Whether hex key `index` is held. Out of range keys are never held.
    pub fn key(&self, index: usize) -> bool {
        self.keys.get(index).copied().unwrap_or(false)
    }

    /// True while the sound timer is running; the front end should beep.
    pub fn sound_active(&self) -> bool {
        self.st > 0
    }

    /// Number of instructions executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The instruction word at pc, i.e. the next one `step` will run.
    pub fn current_opcode(&self) -> u16 {
        u16::from_be_bytes([self.read(self.pc), self.read(self.pc + 1)])
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

fn check_rom_size(size: usize) -> Result<(), Chip8Error> {
    if size > MAX_ROM_BYTES {
        return Err(Chip8Error::RomTooLarge { size, max: MAX_ROM_BYTES });
    }
    Ok(())
}

/// A Chip8 program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    code: Vec<u8>,
}

impl Rom {
    /// Returns a new Chip8 ROM.
    ///
    /// This function returns Err if `code.len() > MAX_ROM_BYTES`.
    pub fn with_code(code: Vec<u8>) -> Result<Self, Chip8Error> {
        check_rom_size(code.len())?;
        Ok(Rom { code })
    }

    /// Reads and validates a ROM file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Chip8Error> {
        let code = fs::read(path)?;
        Self::with_code(code)
    }
}

impl Deref for Rom {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.code
    }
}
