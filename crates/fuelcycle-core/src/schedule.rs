//! Timed overrides of fuel path recipes and preferences.

use crate::fixed::{Fixed64, Ticks};
use crate::fuel_path::FuelPaths;

/// Swap the recipes of the first path accepting `commodity` at `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeChange {
    pub time: Ticks,
    pub commodity: String,
    pub in_recipe: String,
    pub out_recipe: String,
}

/// Set the preference of the first path accepting `commodity` at `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceChange {
    pub time: Ticks,
    pub commodity: String,
    pub value: Fixed64,
}

/// Validated override schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSchedule {
    pub recipes: Vec<RecipeChange>,
    pub preferences: Vec<PreferenceChange>,
}

/// What [`OverrideSchedule::apply`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedOverrides {
    pub preferences: usize,
    pub recipes: usize,
    /// Due overrides naming a commodity no path accepts.
    pub unmatched: usize,
}

impl OverrideSchedule {
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty() && self.preferences.is_empty()
    }

    /// Commodities named by any override that no path accepts.
    pub fn unmatched_commodities<'a>(&'a self, paths: &FuelPaths) -> Vec<&'a str> {
        self.preferences
            .iter()
            .map(|c| c.commodity.as_str())
            .chain(self.recipes.iter().map(|c| c.commodity.as_str()))
            .filter(|c| paths.position_in(c).is_none())
            .collect()
    }

    /// Apply every override due at `now`. Preferences go first, then recipes.
    pub fn apply(&self, now: Ticks, paths: &mut FuelPaths) -> AppliedOverrides {
        let mut applied = AppliedOverrides::default();

        for change in self.preferences.iter().filter(|c| c.time == now) {
            match paths.first_in_mut(&change.commodity) {
                Some(path) => {
                    path.preference = Some(change.value);
                    applied.preferences += 1;
                }
                None => applied.unmatched += 1,
            }
        }

        for change in self.recipes.iter().filter(|c| c.time == now) {
            match paths.first_in_mut(&change.commodity) {
                Some(path) => {
                    path.in_recipe = change.in_recipe.clone();
                    path.out_recipe = change.out_recipe.clone();
                    applied.recipes += 1;
                }
                None => applied.unmatched += 1,
            }
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed, fuel_path};

    fn paths() -> FuelPaths {
        FuelPaths::new(vec![
            fuel_path("uox", "uox_fresh", "spent_uox", "uox_spent"),
            fuel_path("mox", "mox_fresh", "spent_mox", "mox_spent"),
        ])
        .unwrap()
    }

    fn schedule() -> OverrideSchedule {
        OverrideSchedule {
            recipes: vec![RecipeChange {
                time: 5,
                commodity: "mox".into(),
                in_recipe: "mox2_fresh".into(),
                out_recipe: "mox2_spent".into(),
            }],
            preferences: vec![
                PreferenceChange {
                    time: 5,
                    commodity: "uox".into(),
                    value: fixed(7.0),
                },
                PreferenceChange {
                    time: 6,
                    commodity: "uox".into(),
                    value: fixed(9.0),
                },
            ],
        }
    }

    #[test]
    fn nothing_applies_off_schedule() {
        let mut p = paths();
        let applied = schedule().apply(4, &mut p);
        assert_eq!(applied, AppliedOverrides::default());
        assert_eq!(p, paths());
    }

    #[test]
    fn due_overrides_apply_by_path() {
        let mut p = paths();
        let applied = schedule().apply(5, &mut p);
        assert_eq!(applied.preferences, 1);
        assert_eq!(applied.recipes, 1);
        assert_eq!(p.get(0).unwrap().preference, Some(fixed(7.0)));
        assert_eq!(p.get(1).unwrap().in_recipe, "mox2_fresh");
        assert_eq!(p.get(1).unwrap().out_recipe, "mox2_spent");
        // The other path is untouched.
        assert_eq!(p.get(0).unwrap().in_recipe, "uox_fresh");
    }

    #[test]
    fn unknown_commodity_is_counted_not_applied() {
        let mut p = paths();
        let s = OverrideSchedule {
            recipes: Vec::new(),
            preferences: vec![PreferenceChange {
                time: 0,
                commodity: "thorium".into(),
                value: fixed(1.0),
            }],
        };
        assert_eq!(s.unmatched_commodities(&p), vec!["thorium"]);
        assert_eq!(s.apply(0, &mut p).unmatched, 1);
        assert_eq!(p, paths());
    }
}
