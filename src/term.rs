//! A terminal front end on top of crossterm.
//!
//! Two display rows share one character cell using half blocks, so the
//! 64x32 screen takes 64x16 cells. Most terminals only report key presses,
//! never releases; there a pressed key is held for [`KEY_HOLD_TICKS`] ticks
//! and re-armed by the terminal's own key repeat.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{cursor, execute, queue, style, terminal};
use log::{debug, warn};

use crate::chip8::{Display, Registers, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::clock::{Session, TickReport};
use crate::disasm::disassemble;
use crate::keypad;

/// Ticks a key stays down after a press when the terminal can't report releases.
pub const KEY_HOLD_TICKS: u8 = 15;

const PANEL_COLUMN: u16 = DISPLAY_WIDTH as u16 + 3;
const STATUS_ROW: u16 = (DISPLAY_HEIGHT / 2) as u16 + 3;

/// Front end actions that aren't hex pad keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePause,
    Step,
    Reset,
    Restart,
    Faster,
    Slower,
}

/// A decoded terminal key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Pad { key: u8, pressed: bool },
    Command(Command),
}

/// Translates a crossterm key event into pad or command input.
pub fn map_key_event(evt: &KeyEvent) -> Option<Input> {
    let pressed = evt.kind != KeyEventKind::Release;
    if let KeyCode::Char(c) = evt.code {
        if c == 'c' && evt.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Input::Command(Command::Quit));
        }
        if let Some(key) = keypad::key_for_char(c) {
            return Some(Input::Pad { key, pressed });
        }
    }
    if !pressed {
        return None;
    }
    let cmd = match evt.code {
        KeyCode::Esc => Command::Quit,
        KeyCode::Char(' ') => Command::TogglePause,
        KeyCode::Char('.') => Command::Step,
        KeyCode::Backspace => Command::Reset,
        KeyCode::Enter => Command::Restart,
        KeyCode::Char('+') | KeyCode::Char('=') => Command::Faster,
        KeyCode::Char('-') => Command::Slower,
        _ => return None,
    };
    Some(Input::Command(cmd))
}

/// Tracks held pad keys for terminals that never send a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLatch {
    holds: [u8; 16],
    auto_release: bool,
}

impl KeyLatch {
    pub fn new(auto_release: bool) -> Self {
        KeyLatch { holds: [0; 16], auto_release }
    }

    pub fn press(&mut self, key: u8) {
        if let Some(hold) = self.holds.get_mut(key as usize) {
            *hold = KEY_HOLD_TICKS;
        }
    }

    pub fn release(&mut self, key: u8) {
        if let Some(hold) = self.holds.get_mut(key as usize) {
            *hold = 0;
        }
    }

    /// Counts down the holds, returning the keys whose hold ran out.
    pub fn tick(&mut self) -> Vec<u8> {
        if !self.auto_release {
            return Vec::new();
        }
        let mut expired = Vec::new();
        for (key, hold) in self.holds.iter_mut().enumerate() {
            if *hold > 0 {
                *hold -= 1;
                if *hold == 0 {
                    expired.push(key as u8);
                }
            }
        }
        expired
    }
}

/// Renders the framebuffer as lines of half-block characters.
pub fn render_frame(display: &Display) -> Vec<String> {
    display
        .chunks(2)
        .map(|rows| {
            (0..DISPLAY_WIDTH)
                .map(|x| {
                    let top = rows[0][x] == 1;
                    let bottom = rows.get(1).is_some_and(|row| row[x] == 1);
                    match (top, bottom) {
                        (true, true) => '\u{2588}',
                        (true, false) => '\u{2580}',
                        (false, true) => '\u{2584}',
                        (false, false) => ' ',
                    }
                })
                .collect()
        })
        .collect()
}

/// Renders the register panel, including the next instruction.
pub fn render_registers(regs: &Registers, next: u16) -> Vec<String> {
    let mut lines: Vec<String> = regs
        .v
        .chunks(4)
        .enumerate()
        .map(|(row, vals)| {
            vals.iter()
                .enumerate()
                .map(|(col, val)| format!("V{:X}:{val:02X}", row * 4 + col))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    lines.push(format!("I:{:03X}  PC:{:03X}  SP:{:X}", regs.index, regs.pc, regs.sp));
    lines.push(format!("DT:{:02X}  ST:{:02X}", regs.dt, regs.st));
    lines.push(format!("Cycles: {}", regs.cycles));
    lines.push(format!("Next: {next:04X} {}", disassemble(next)));
    lines
}

/// Renders the status line.
pub fn status_line(paused: bool, cps: u32, rom: Option<&str>, message: &str) -> String {
    let mut parts = vec![if paused { "Paused".to_string() } else { "Running".to_string() }];
    parts.push(format!("CPS: {cps}"));
    if let Some(rom) = rom {
        parts.push(format!("ROM: {rom}"));
    }
    if !message.is_empty() {
        parts.push(message.to_string());
    }
    parts.join("  |  ")
}

/// Owns the terminal for the lifetime of the emulator.
pub struct TerminalUi<W: Write = Stdout> {
    out: W,
    latch: KeyLatch,
    enhanced: bool,
    rom_name: Option<String>,
    message: String,
}

impl TerminalUi {
    /// Switches the terminal into raw mode on the alternate screen.
    pub fn new(rom_name: Option<String>) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        // From here on an early return drops `ui`, which restores the terminal.
        let mut ui = TerminalUi::with_writer(io::stdout(), rom_name);
        ui.enter()?;
        Ok(ui)
    }
}

impl<W: Write> TerminalUi<W> {
    fn with_writer(out: W, rom_name: Option<String>) -> Self {
        TerminalUi {
            out,
            latch: KeyLatch::new(true),
            enhanced: false,
            rom_name,
            message: String::new(),
        }
    }

    fn enter(&mut self) -> io::Result<()> {
        execute!(self.out, terminal::EnterAlternateScreen, cursor::Hide, terminal::Clear(terminal::ClearType::All))?;
        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(self.out, PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES))?;
            self.enable_release_events();
        }
        debug!("keyboard release events reported: {}", self.enhanced);
        Ok(())
    }

    // Real key releases are coming, so held keys no longer time out.
    fn enable_release_events(&mut self) {
        self.enhanced = true;
        self.latch = KeyLatch::new(false);
    }

    /// Sets the message shown at the end of the status line.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Drains pending terminal events without blocking. Pad keys go straight
    /// to the session, everything else is returned.
    pub fn poll_input(&mut self, session: &mut Session) -> io::Result<Vec<Command>> {
        let mut commands = Vec::new();
        while event::poll(Duration::ZERO)? {
            let Event::Key(evt) = event::read()? else {
                continue;
            };
            match map_key_event(&evt) {
                Some(Input::Pad { key, pressed: true }) => {
                    self.latch.press(key);
                    session.press(key, true);
                }
                Some(Input::Pad { key, pressed: false }) => {
                    self.latch.release(key);
                    session.press(key, false);
                }
                Some(Input::Command(cmd)) => commands.push(cmd),
                None => {}
            }
        }
        for key in self.latch.tick() {
            session.press(key, false);
        }
        Ok(commands)
    }

    /// Presents one tick: the framebuffer if it changed, then registers and status.
    pub fn draw(&mut self, session: &mut Session, report: &TickReport) -> io::Result<()> {
        if report.redraw {
            for (row, line) in render_frame(session.machine().display()).iter().enumerate() {
                queue!(self.out, cursor::MoveTo(1, row as u16 + 1), style::Print(line))?;
            }
            session.machine_mut().clear_draw_flag();
        }

        let regs = session.machine().registers();
        let next = session.machine().current_opcode();
        for (row, line) in render_registers(&regs, next).iter().enumerate() {
            queue!(
                self.out,
                cursor::MoveTo(PANEL_COLUMN, row as u16 + 1),
                terminal::Clear(terminal::ClearType::UntilNewLine),
                style::Print(line)
            )?;
        }

        let status = status_line(session.is_paused(), session.cycles_per_second(), self.rom_name.as_deref(), &self.message);
        queue!(
            self.out,
            cursor::MoveTo(0, STATUS_ROW),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(status),
            cursor::MoveTo(0, STATUS_ROW + 1),
            style::Print("Esc quit  Space pause  . step  Backspace reset  Enter restart  +/- speed"),
        )?;

        if report.beep {
            queue!(self.out, style::Print('\u{7}'))?;
        }
        self.out.flush()
    }

    /// Draws the border around the screen area. Call once after creation.
    pub fn draw_border(&mut self) -> io::Result<()> {
        let horizontal = "-".repeat(DISPLAY_WIDTH);
        let bottom = (DISPLAY_HEIGHT / 2) as u16 + 1;
        queue!(self.out, cursor::MoveTo(0, 0), style::Print(format!("+{horizontal}+")))?;
        for row in 1..bottom {
            queue!(
                self.out,
                cursor::MoveTo(0, row),
                style::Print('|'),
                cursor::MoveTo(DISPLAY_WIDTH as u16 + 1, row),
                style::Print('|')
            )?;
        }
        queue!(self.out, cursor::MoveTo(0, bottom), style::Print(format!("+{horizontal}+")))?;
        self.out.flush()
    }
}

impl<W: Write> Drop for TerminalUi<W> {
    fn drop(&mut self) {
        if self.enhanced {
            if let Err(e) = execute!(self.out, PopKeyboardEnhancementFlags) {
                warn!("failed to pop keyboard enhancement flags: {e}");
            }
        }
        if let Err(e) = execute!(self.out, cursor::Show, terminal::LeaveAlternateScreen) {
            warn!("failed to restore screen: {e}");
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("failed to leave raw mode: {e}");
        }
    }
}
