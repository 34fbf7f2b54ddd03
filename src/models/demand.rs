use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::global_variables::{
    ARRIVAL_FACTOR_MAX, ARRIVAL_FACTOR_MIN, CLEARANCE_FACTOR_MAX, CLEARANCE_FACTOR_MIN,
};

/// Source of the random inputs used by the synthetic demand model and the
/// random emergency trigger.
pub trait DemandNoise {
    /// Multiplier applied to green-light clearance, in 0.9..=1.1.
    fn clearance_factor(&mut self) -> f64;
    /// Multiplier applied to red-light arrivals, in 0.8..=1.2.
    fn arrival_factor(&mut self) -> f64;
    /// Uniform roll in 0.0..1.0 compared against the emergency probability.
    fn emergency_roll(&mut self) -> f64;
}

/// `DemandNoise` backed by a `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomNoise<R> {
    rng: R,
}

impl<R: Rng> RandomNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomNoise<SmallRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(SmallRng::from_os_rng())
    }
}

impl<R: Rng> DemandNoise for RandomNoise<R> {
    fn clearance_factor(&mut self) -> f64 {
        self.rng.random_range(CLEARANCE_FACTOR_MIN..=CLEARANCE_FACTOR_MAX)
    }

    fn arrival_factor(&mut self) -> f64 {
        self.rng.random_range(ARRIVAL_FACTOR_MIN..=ARRIVAL_FACTOR_MAX)
    }

    fn emergency_roll(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Constant noise, for deterministic runs and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedNoise {
    pub clearance: f64,
    pub arrival: f64,
    pub roll: f64,
}

impl FixedNoise {
    pub fn new(clearance: f64, arrival: f64, roll: f64) -> Self {
        Self {
            clearance,
            arrival,
            roll,
        }
    }

    /// Nominal factors and a roll that never fires an emergency.
    pub fn nominal() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl DemandNoise for FixedNoise {
    fn clearance_factor(&mut self) -> f64 {
        self.clearance
    }

    fn arrival_factor(&mut self) -> f64 {
        self.arrival
    }

    fn emergency_roll(&mut self) -> f64 {
        self.roll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_factors_stay_in_range() {
        let mut noise = RandomNoise::seeded(7);
        for _ in 0..1000 {
            let c = noise.clearance_factor();
            let a = noise.arrival_factor();
            let r = noise.emergency_roll();
            assert!((CLEARANCE_FACTOR_MIN..=CLEARANCE_FACTOR_MAX).contains(&c));
            assert!((ARRIVAL_FACTOR_MIN..=ARRIVAL_FACTOR_MAX).contains(&a));
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomNoise::seeded(42);
        let mut b = RandomNoise::seeded(42);
        for _ in 0..20 {
            assert_eq!(a.arrival_factor(), b.arrival_factor());
            assert_eq!(a.emergency_roll(), b.emergency_roll());
        }
    }
}
