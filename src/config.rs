use log::warn;

/// Instructions per second when nothing else is asked for.
pub const DEFAULT_CYCLES_PER_SECOND: u32 = 700;
/// Slowest supported speed.
pub const MIN_CYCLES_PER_SECOND: u32 = 60;
/// Fastest supported speed.
pub const MAX_CYCLES_PER_SECOND: u32 = 3000;
/// Amount a single speed up/down changes the speed by.
pub const CYCLES_PER_SECOND_STEP: u32 = 20;

/// Runtime tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cycles_per_second: u32,
    pub seed: Option<u64>,
    pub start_paused: bool,
}

impl Settings {
    /// Returns settings with `cycles_per_second` clamped to the supported range.
    pub fn new(cycles_per_second: u32, seed: Option<u64>, start_paused: bool) -> Self {
        let clamped = clamp_cycles_per_second(cycles_per_second);
        if clamped != cycles_per_second {
            warn!("{cycles_per_second} cycles per second is out of range, using {clamped}");
        }
        Settings { cycles_per_second: clamped, seed, start_paused }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings { cycles_per_second: DEFAULT_CYCLES_PER_SECOND, seed: None, start_paused: false }
    }
}

/// Clamps a speed to `MIN_CYCLES_PER_SECOND..=MAX_CYCLES_PER_SECOND`.
pub fn clamp_cycles_per_second(cps: u32) -> u32 {
    cps.clamp(MIN_CYCLES_PER_SECOND, MAX_CYCLES_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_speed() {
        assert_eq!(Settings::new(10, None, false).cycles_per_second, 60);
        assert_eq!(Settings::new(10_000, None, false).cycles_per_second, 3000);
        assert_eq!(Settings::new(900, Some(3), true), Settings { cycles_per_second: 900, seed: Some(3), start_paused: true });
    }

    #[test]
    fn default_runs_at_700() {
        let settings = Settings::default();
        assert_eq!(settings.cycles_per_second, 700);
        assert!(!settings.start_paused);
    }
}
