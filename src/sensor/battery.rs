//! Battery level source
//!
//! The reference hardware has no battery gauge. The level published in
//! telemetry is a uniform random draw, and the type names say so.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lowest simulated battery level (inclusive)
pub const BATTERY_LEVEL_MIN: u8 = 20;
/// Upper bound of simulated battery levels (exclusive)
pub const BATTERY_LEVEL_MAX: u8 = 100;

/// Anything that can produce a battery percentage for a telemetry cycle
pub trait BatterySource: Send {
    fn level(&mut self) -> u8;
}

/// Simulated battery: uniform draw in `[20, 100)` every cycle
pub struct SimulatedBattery {
    rng: StdRng,
}

impl SimulatedBattery {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        Self::new()
    }
}

impl BatterySource for SimulatedBattery {
    fn level(&mut self) -> u8 {
        self.rng.gen_range(BATTERY_LEVEL_MIN..BATTERY_LEVEL_MAX)
    }
}

impl<B: BatterySource + ?Sized> BatterySource for Box<B> {
    fn level(&mut self) -> u8 {
        (**self).level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_levels_stay_in_range() {
        let mut battery = SimulatedBattery::new();
        for _ in 0..10_000 {
            let level = battery.level();
            assert!((BATTERY_LEVEL_MIN..BATTERY_LEVEL_MAX).contains(&level));
        }
    }

    #[test]
    fn test_seeded_batteries_agree() {
        let mut a = SimulatedBattery::seeded(42);
        let mut b = SimulatedBattery::seeded(42);
        let first: Vec<u8> = (0..20).map(|_| a.level()).collect();
        let second: Vec<u8> = (0..20).map(|_| b.level()).collect();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn any_seed_yields_levels_in_range(seed in any::<u64>()) {
            let mut battery = SimulatedBattery::seeded(seed);
            for _ in 0..50 {
                let level = battery.level();
                prop_assert!(level >= 20 && level < 100, "level {} out of range", level);
            }
        }
    }
}
