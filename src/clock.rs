//! Frame pacing for a [`Chip8`]: how many instructions to run per 60 Hz tick,
//! plus the session state a front end needs around the machine.

use log::{debug, info};

use crate::chip8::{Chip8, Rom};
use crate::config::{self, Settings, CYCLES_PER_SECOND_STEP};

/// Display and timer refresh rate.
pub const TICKS_PER_SECOND: u32 = 60;

/// Splits a cycles-per-second target into whole instructions per tick.
///
/// The fractional part is carried from tick to tick, so any speed sums to
/// exactly `cycles_per_second` instructions over 60 ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleBudget {
    cycles_per_second: u32,
    // Carried remainder, in sixtieths of a cycle.
    accumulator: u32,
}

impl CycleBudget {
    pub fn new(cycles_per_second: u32) -> Self {
        CycleBudget {
            cycles_per_second: config::clamp_cycles_per_second(cycles_per_second),
            accumulator: 0,
        }
    }

    pub fn cycles_per_second(&self) -> u32 {
        self.cycles_per_second
    }

    /// Changes the speed, keeping whatever fraction is already carried.
    pub fn set_cycles_per_second(&mut self, cps: u32) {
        self.cycles_per_second = config::clamp_cycles_per_second(cps);
    }

    /// The number of instructions to run this tick.
    pub fn cycles_for_tick(&mut self) -> u32 {
        self.accumulator += self.cycles_per_second;
        let cycles = self.accumulator / TICKS_PER_SECOND;
        self.accumulator %= TICKS_PER_SECOND;
        cycles
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub cycles_run: u32,
    /// The sound timer is still running.
    pub beep: bool,
    /// The display needs presenting.
    pub redraw: bool,
}

/// One machine plus the run/pause/speed state a front end drives it with.
#[derive(Debug)]
pub struct Session {
    machine: Chip8,
    rom: Option<Rom>,
    budget: CycleBudget,
    paused: bool,
}

impl Session {
    pub fn new(settings: &Settings) -> Self {
        let machine = match settings.seed {
            Some(seed) => Chip8::with_seed(seed),
            None => Chip8::new(),
        };
        Session {
            machine,
            rom: None,
            budget: CycleBudget::new(settings.cycles_per_second),
            paused: settings.start_paused,
        }
    }

    /// Loads `rom` and starts running it.
    pub fn load(&mut self, rom: Rom) {
        self.machine.load(&rom);
        info!("loaded {} byte ROM", rom.len());
        self.rom = Some(rom);
        self.paused = false;
    }

    /// Runs one 60 Hz tick: this tick's share of instructions, then one timer
    /// decrement. Nothing executes while paused.
    pub fn run_tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if !self.paused {
            let cycles = self.budget.cycles_for_tick();
            for _ in 0..cycles {
                self.machine.step();
            }
            self.machine.tick_timers();
            report.cycles_run = cycles;
            report.beep = self.machine.sound_active();
        }
        report.redraw = self.machine.draw_flag();
        report
    }

    /// Executes exactly one instruction regardless of pause state or speed.
    pub fn single_step(&mut self) {
        self.machine.step();
        self.machine.force_redraw();
    }

    /// Flips between running and paused, returning true if now paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        debug!("paused: {}", self.paused);
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Resets the machine. Program memory is wiped along with everything else.
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    /// Reloads the current ROM from scratch. Returns false if none is loaded.
    pub fn restart(&mut self) -> bool {
        match &self.rom {
            Some(rom) => {
                self.machine.load(rom);
                true
            }
            None => false,
        }
    }

    /// Speeds up by one step, returning the new speed.
    pub fn faster(&mut self) -> u32 {
        let cps = self.budget.cycles_per_second() + CYCLES_PER_SECOND_STEP;
        self.budget.set_cycles_per_second(cps);
        self.budget.cycles_per_second()
    }

    /// Slows down by one step, returning the new speed.
    pub fn slower(&mut self) -> u32 {
        let cps = self.budget.cycles_per_second().saturating_sub(CYCLES_PER_SECOND_STEP);
        self.budget.set_cycles_per_second(cps);
        self.budget.cycles_per_second()
    }

    pub fn cycles_per_second(&self) -> u32 {
        self.budget.cycles_per_second()
    }

    /// Forwards a key change to the machine.
    pub fn press(&mut self, key: u8, pressed: bool) {
        self.machine.set_key(key as usize, pressed);
    }

    pub fn has_rom(&self) -> bool {
        self.rom.is_some()
    }

    pub fn machine(&self) -> &Chip8 {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Chip8 {
        &mut self.machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(code: &[u8], cps: u32) -> Session {
        let mut session = Session::new(&Settings::new(cps, Some(1), false));
        session.load(Rom::with_code(code.to_vec()).unwrap());
        session
    }

    #[test]
    fn budget_carries_fractions() {
        let mut budget = CycleBudget::new(90);
        let ticks: Vec<u32> = (0..4).map(|_| budget.cycles_for_tick()).collect();
        assert_eq!(ticks, [1, 2, 1, 2]);
    }

    #[test]
    fn budget_sums_to_speed_each_second() {
        for cps in [60, 90, 700, 1234, 3000] {
            let mut budget = CycleBudget::new(cps);
            let total: u32 = (0..TICKS_PER_SECOND).map(|_| budget.cycles_for_tick()).sum();
            assert_eq!(total, cps);
        }
    }

    #[test]
    fn budget_clamps_speed() {
        let mut budget = CycleBudget::new(1);
        assert_eq!(budget.cycles_per_second(), 60);
        budget.set_cycles_per_second(9000);
        assert_eq!(budget.cycles_per_second(), 3000);
    }

    #[test]
    fn speed_change_keeps_carried_fraction() {
        let mut budget = CycleBudget::new(90);
        assert_eq!(budget.cycles_for_tick(), 1);
        // 30/60 carried over, plus 150/60
        budget.set_cycles_per_second(150);
        assert_eq!(budget.cycles_for_tick(), 3);
    }

    #[test]
    fn load_unpauses() {
        let mut session = Session::new(&Settings::new(600, Some(1), true));
        assert!(session.is_paused());
        assert_eq!(session.run_tick().cycles_run, 0);

        session.load(Rom::with_code(vec![0x12, 0x00]).unwrap());
        assert!(!session.is_paused());
        assert!(session.run_tick().cycles_run > 0);

        session.toggle_pause();
        session.load(Rom::with_code(vec![0x12, 0x00]).unwrap());
        assert!(!session.is_paused());
    }

    #[test]
    fn tick_runs_budgeted_cycles_then_timers() {
        let mut session = session_with(&[
            0x60, 0x03, // set V0 to 3
            0xF0, 0x15, // dt = V0
            0xF0, 0x18, // st = V0
            0x12, 0x06, // spin
        ], 600);
        let report = session.run_tick();
        assert_eq!(report.cycles_run, 10);
        assert_eq!(session.machine().cycles(), 10);
        // set to 3 this tick, then ticked once
        assert_eq!(session.machine().registers().dt, 2);
        assert!(report.beep);

        session.run_tick();
        let report = session.run_tick();
        assert_eq!(session.machine().registers().st, 0);
        assert!(!report.beep);
    }

    #[test]
    fn paused_session_does_nothing() {
        let mut session = session_with(&[0x12, 0x00], 600);
        assert!(session.toggle_pause());
        let report = session.run_tick();
        assert_eq!(report.cycles_run, 0);
        assert_eq!(session.machine().cycles(), 0);
        assert!(!session.toggle_pause());
    }

    #[test]
    fn single_step_runs_one_instruction_and_forces_redraw() {
        let mut session = session_with(&[0x6A, 0x01, 0x6B, 0x02], 600);
        session.toggle_pause();
        session.machine_mut().clear_draw_flag();
        session.single_step();
        assert_eq!(session.machine().cycles(), 1);
        assert_eq!(session.machine().registers().v[0x0A], 1);
        assert_eq!(session.machine().registers().v[0x0B], 0);
        assert!(session.run_tick().redraw);
    }

    #[test]
    fn restart_reloads_rom_and_reset_wipes_it() {
        let mut session = session_with(&[0x6A, 0x01], 600);
        session.single_step();
        assert!(session.restart());
        assert_eq!(session.machine().registers().v[0x0A], 0);
        assert_eq!(session.machine().current_opcode(), 0x6A01);

        session.reset();
        assert_eq!(session.machine().current_opcode(), 0x0000);
        assert!(session.has_rom());

        let mut empty = Session::new(&Settings::default());
        assert!(!empty.restart());
    }

    #[test]
    fn speed_steps_within_bounds() {
        let mut session = session_with(&[], 80);
        assert_eq!(session.slower(), 60);
        assert_eq!(session.slower(), 60);
        assert_eq!(session.faster(), 80);

        let mut session = session_with(&[], 2990);
        assert_eq!(session.faster(), 3000);
        assert_eq!(session.cycles_per_second(), 3000);
    }

    #[test]
    fn press_resolves_key_wait() {
        let mut session = session_with(&[0xF5, 0x0A], 600);
        session.run_tick();
        assert_eq!(session.machine().waiting_for_key(), Some(5));
        assert_eq!(session.machine().cycles(), 1);
        session.press(0xB, true);
        assert_eq!(session.machine().registers().v[5], 0xB);
        assert!(session.machine().key(0xB));
    }
}
