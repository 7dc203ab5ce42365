/// Counter-and-modulus policy deciding which ticks run detection.
///
/// The first tick always runs; afterwards every `interval`-th tick does.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: u32,
    counter: u64,
}

impl Cadence {
    /// An interval of 0 is treated as 1 (every tick).
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub fn every_tick() -> Self {
        Self::new(1)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Advance one tick; true if this tick is due.
    pub fn should_run(&mut self) -> bool {
        let due = self.counter % u64::from(self.interval) == 0;
        self.counter += 1;
        due
    }
}
