//! Stochastic challenge resolution.
//!
//! The attacker's bonus window is deliberately wider than the defender's
//! (defaults 0..=10 vs 0..=5) so entrenched rosters can still be broken;
//! both spreads come from `ArenaConfig`.

use contracts::ArenaConfig;

use crate::rng::{mix_seed, sample_range_i64};

#[derive(Debug, Clone, Copy)]
pub struct BattleRules {
    seed: u64,
    attacker_spread: i64,
    defender_spread: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleRolls {
    pub attacker_roll: i64,
    pub defense_roll: i64,
    pub victory: bool,
}

impl BattleRules {
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self {
            seed: config.seed,
            attacker_spread: config.attacker_roll_spread.max(0),
            defender_spread: config.defender_roll_spread.max(0),
        }
    }

    /// Resolve one challenge. `sequence` is the arena's monotonic battle
    /// counter, which makes replays reproducible and successive battles
    /// independent.
    pub fn resolve(&self, sequence: u64, attacker_level: i64, control_strength: i64) -> BattleRolls {
        let stream = mix_seed(self.seed, sequence);
        let attacker_roll = attacker_level + sample_range_i64(stream, 1, 0, self.attacker_spread);
        let defense_roll = control_strength + sample_range_i64(stream, 2, 0, self.defender_spread);
        BattleRolls {
            attacker_roll,
            defense_roll,
            victory: attacker_roll > defense_roll,
        }
    }
}
