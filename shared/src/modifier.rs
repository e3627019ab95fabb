//! Stat modifiers accumulated over a run.
//!
//! Every stat starts from a base of `1.0`. Additive magnitudes on the same
//! stat are summed onto that base, then each multiplicative magnitude scales
//! the result by `1 + magnitude`:
//!
//! ```text
//! value = (1 + Σ additive) × Π (1 + multiplicative)
//! ```
//!
//! With no modifiers every stat evaluates to `1.0`, so callers can multiply
//! base stats by the value unconditionally.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Position;

/// Distance within which a player can pick up a boon.
pub const BOON_RANGE: f64 = 24.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierCalc {
    Additive,
    Multiplicative,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierStat {
    Speed,
    Damage,
    FireRate,
    Life,
}

impl ModifierStat {
    pub const ALL: [ModifierStat; 4] = [
        ModifierStat::Speed,
        ModifierStat::Damage,
        ModifierStat::FireRate,
        ModifierStat::Life,
    ];
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Modifier {
    pub calc: ModifierCalc,
    pub stat: ModifierStat,
    /// Fraction, e.g. `0.12` for twelve percent.
    pub value: f64,
}

impl Modifier {
    pub fn new(calc: ModifierCalc, stat: ModifierStat, value: f64) -> Self {
        Self { calc, stat, value }
    }

    fn random<R: Rng>(rng: &mut R, calc: ModifierCalc) -> Self {
        let stat = ModifierStat::ALL[rng.gen_range(0..ModifierStat::ALL.len())];
        let percent = rng.gen_range(5..20);
        Self::new(calc, stat, f64::from(percent) / 100.0)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.calc {
            ModifierCalc::Additive => "increased",
            ModifierCalc::Multiplicative => "more",
        };
        let stat = match self.stat {
            ModifierStat::Speed => "speed",
            ModifierStat::Damage => "damage",
            ModifierStat::FireRate => "fire rate",
            ModifierStat::Life => "life",
        };
        write!(f, "{:.0}% {} {}", self.value * 100.0, kind, stat)
    }
}

/// Evaluates `stat` over one collection of modifiers.
pub fn modified_value(stat: ModifierStat, modifiers: &[Modifier]) -> f64 {
    let mut additive = 1.0;
    let mut multiplier = 1.0;
    for m in modifiers.iter().filter(|m| m.stat == stat) {
        match m.calc {
            ModifierCalc::Additive => additive += m.value,
            ModifierCalc::Multiplicative => multiplier *= 1.0 + m.value,
        }
    }
    additive * multiplier
}

/// Monster-side and player-side modifier collections.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Modifiers {
    pub monster: Vec<Modifier>,
    pub player: Vec<Modifier>,
}

impl Modifiers {
    pub fn monster_value(&self, stat: ModifierStat) -> f64 {
        modified_value(stat, &self.monster)
    }

    pub fn player_value(&self, stat: ModifierStat) -> f64 {
        modified_value(stat, &self.player)
    }

    /// Overall monster strength, every monster modifier folded together
    /// regardless of stat. Scales spawn counts.
    pub fn total_multiplier(&self) -> f64 {
        let mut additive = 1.0;
        let mut multiplier = 1.0;
        for m in &self.monster {
            match m.calc {
                ModifierCalc::Additive => additive += m.value,
                ModifierCalc::Multiplicative => multiplier *= 1.0 + m.value,
            }
        }
        additive * multiplier
    }

    pub fn add(&mut self, other: &Modifiers) {
        self.monster.extend_from_slice(&other.monster);
        self.player.extend_from_slice(&other.player);
    }

    pub fn is_empty(&self) -> bool {
        self.monster.is_empty() && self.player.is_empty()
    }

    pub fn clear(&mut self) {
        self.monster.clear();
        self.player.clear();
    }

    /// Rolls the two options offered after a level: one additive set and one
    /// multiplicative set, each with one monster and one player modifier.
    pub fn random_options<R: Rng>(rng: &mut R) -> Vec<Modifiers> {
        [ModifierCalc::Additive, ModifierCalc::Multiplicative]
            .into_iter()
            .map(|calc| Modifiers {
                monster: vec![Modifier::random(rng, calc)],
                player: vec![Modifier::random(rng, calc)],
            })
            .collect()
    }
}

/// A pickup that grants a [`Modifiers`] option when a player walks onto it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Boon {
    pub position: Position,
    pub modifiers: Modifiers,
    pub range: f64,
}

impl Boon {
    pub fn new(position: Position, modifiers: Modifiers) -> Self {
        Self {
            position,
            modifiers,
            range: BOON_RANGE,
        }
    }

    pub fn in_range(&self, position: &Position) -> bool {
        self.position.distance(position) <= self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_additive_then_multiplicative() {
        let modifiers = Modifiers {
            monster: Vec::new(),
            player: vec![
                Modifier::new(ModifierCalc::Additive, ModifierStat::Damage, 0.2),
                Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Damage, 0.5),
            ],
        };

        assert_approx_eq!(modifiers.player_value(ModifierStat::Damage), 1.8);
    }

    #[test]
    fn test_empty_modifiers_are_neutral() {
        let modifiers = Modifiers::default();
        for stat in ModifierStat::ALL {
            assert_approx_eq!(modifiers.monster_value(stat), 1.0);
            assert_approx_eq!(modifiers.player_value(stat), 1.0);
        }
        assert_approx_eq!(modifiers.total_multiplier(), 1.0);
    }

    #[test]
    fn test_other_stats_are_ignored() {
        let modifiers = Modifiers {
            monster: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Speed, 0.3)],
            player: Vec::new(),
        };
        assert_approx_eq!(modifiers.monster_value(ModifierStat::Life), 1.0);
        assert_approx_eq!(modifiers.monster_value(ModifierStat::Speed), 1.3);
    }

    #[test]
    fn test_multiplicative_modifiers_compound() {
        let modifiers = Modifiers {
            monster: vec![
                Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Life, 0.1),
                Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Life, 0.1),
            ],
            player: Vec::new(),
        };
        assert_approx_eq!(modifiers.monster_value(ModifierStat::Life), 1.21);
    }

    #[test]
    fn test_total_multiplier_spans_stats() {
        let modifiers = Modifiers {
            monster: vec![
                Modifier::new(ModifierCalc::Additive, ModifierStat::Speed, 0.1),
                Modifier::new(ModifierCalc::Additive, ModifierStat::Life, 0.1),
                Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Damage, 0.5),
            ],
            player: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Life, 5.0)],
        };
        assert_approx_eq!(modifiers.total_multiplier(), 1.8);
    }

    #[test]
    fn test_add_and_clear() {
        let mut acc = Modifiers::default();
        let option = Modifiers {
            monster: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Speed, 0.1)],
            player: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Damage, 0.1)],
        };
        acc.add(&option);
        acc.add(&option);
        assert_eq!(acc.monster.len(), 2);
        assert_approx_eq!(acc.player_value(ModifierStat::Damage), 1.2);

        acc.clear();
        assert!(acc.is_empty());
    }

    #[test]
    fn test_random_options_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let options = Modifiers::random_options(&mut rng);
            assert_eq!(options.len(), 2);
            assert_eq!(options[0].monster[0].calc, ModifierCalc::Additive);
            assert_eq!(options[1].player[0].calc, ModifierCalc::Multiplicative);
            for option in &options {
                assert_eq!(option.monster.len(), 1);
                assert_eq!(option.player.len(), 1);
                for m in option.monster.iter().chain(option.player.iter()) {
                    assert!(m.value >= 0.05 && m.value <= 0.19);
                }
            }
        }
    }

    #[test]
    fn test_boon_range() {
        let boon = Boon::new(Position::new(100.0, 100.0), Modifiers::default());
        assert!(boon.in_range(&Position::new(110.0, 100.0)));
        assert!(!boon.in_range(&Position::new(200.0, 100.0)));
    }

    #[test]
    fn test_display() {
        let m = Modifier::new(ModifierCalc::Multiplicative, ModifierStat::FireRate, 0.12);
        assert_eq!(m.to_string(), "12% more fire rate");
    }
}
