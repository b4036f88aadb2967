//! Milestone tracking
//!
//! Decides which of the canonical progress thresholds (25/50/75/100) have just
//! been crossed for a tracking scope. The decision itself is a pure function;
//! `MilestoneTracker` wraps it with the per-scope fired set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A canonical progress threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Milestone {
    P25,
    P50,
    P75,
    P100,
}

impl Milestone {
    /// All thresholds in ascending order
    pub const ALL: [Milestone; 4] = [Milestone::P25, Milestone::P50, Milestone::P75, Milestone::P100];

    /// Threshold as a percentage
    pub const fn percent(self) -> u8 {
        match self {
            Milestone::P25 => 25,
            Milestone::P50 => 50,
            Milestone::P75 => 75,
            Milestone::P100 => 100,
        }
    }
}

impl From<Milestone> for u8 {
    fn from(m: Milestone) -> Self {
        m.percent()
    }
}

impl TryFrom<u8> for Milestone {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Milestone::ALL
            .into_iter()
            .find(|m| m.percent() == value)
            .ok_or_else(|| format!("{value} is not a milestone (expected 25, 50, 75 or 100)"))
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Thresholds already reported for one scope.
///
/// Only grows while the scope lives. The only way to empty it is a scope
/// reset through [`MilestoneTracker::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSet {
    fired: BTreeSet<Milestone>,
}

impl MilestoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, milestone: Milestone) -> bool {
        self.fired.contains(&milestone)
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    /// Fired thresholds in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Milestone> + '_ {
        self.fired.iter().copied()
    }

    /// Fired thresholds as percentages, ascending
    pub fn percents(&self) -> Vec<u8> {
        self.iter().map(Milestone::percent).collect()
    }

    fn record(&mut self, milestone: Milestone) {
        self.fired.insert(milestone);
    }

    fn clear(&mut self) {
        self.fired.clear();
    }
}

impl FromIterator<Milestone> for MilestoneSet {
    fn from_iter<I: IntoIterator<Item = Milestone>>(iter: I) -> Self {
        Self {
            fired: iter.into_iter().collect(),
        }
    }
}

/// Convert a ratio (1.0 = 100%) to a whole percentage clamped to `[0, 100]`.
///
/// Non-finite ratios map to 0.
pub fn ratio_to_percent(ratio: f64) -> u8 {
    if !ratio.is_finite() {
        return 0;
    }
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Thresholds at or below `current_progress` that have not fired yet, ascending.
pub fn evaluate(current_progress: u8, already_fired: &MilestoneSet) -> Vec<Milestone> {
    Milestone::ALL
        .into_iter()
        .filter(|m| m.percent() <= current_progress)
        .filter(|m| !already_fired.contains(*m))
        .collect()
}

/// Milestone state for a single tracking scope
#[derive(Debug, Clone, Default)]
pub struct MilestoneTracker {
    fired: MilestoneSet,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a progress sample and record whatever it newly crossed.
    pub fn observe(&mut self, progress: u8) -> Vec<Milestone> {
        let newly_fired = evaluate(progress, &self.fired);
        for milestone in &newly_fired {
            self.fired.record(*milestone);
        }
        newly_fired
    }

    pub fn fired(&self) -> &MilestoneSet {
        &self.fired
    }

    /// Start a fresh scope
    pub fn reset(&mut self) {
        self.fired.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_jump_fires_all_crossed_in_order() {
        let mut tracker = MilestoneTracker::new();
        assert!(tracker.observe(10).is_empty());

        let fired = tracker.observe(80);
        assert_eq!(fired, vec![Milestone::P25, Milestone::P50, Milestone::P75]);
        assert!(!tracker.fired().contains(Milestone::P100));
    }

    #[test]
    fn test_threshold_fires_once_per_scope() {
        let mut tracker = MilestoneTracker::new();

        // Oscillate across 50 several times
        let mut total = Vec::new();
        for progress in [30, 55, 40, 60, 45, 52, 100, 20, 100] {
            total.extend(tracker.observe(progress));
        }

        assert_eq!(total, Milestone::ALL.to_vec());
    }

    #[test]
    fn test_scrolling_back_up_does_not_retract() {
        let mut tracker = MilestoneTracker::new();
        tracker.observe(76);
        tracker.observe(5);

        assert_eq!(tracker.fired().percents(), vec![25, 50, 75]);
    }

    #[test]
    fn test_evaluate_is_set_difference() {
        let fired: MilestoneSet = [Milestone::P25, Milestone::P75].into_iter().collect();

        for progress in 0..=100u8 {
            let expected: Vec<Milestone> = Milestone::ALL
                .into_iter()
                .filter(|m| m.percent() <= progress && !fired.contains(*m))
                .collect();
            assert_eq!(evaluate(progress, &fired), expected, "progress {progress}");
        }
    }

    #[test]
    fn test_exact_threshold_fires() {
        assert_eq!(evaluate(25, &MilestoneSet::new()), vec![Milestone::P25]);
        assert!(evaluate(24, &MilestoneSet::new()).is_empty());
    }

    #[test]
    fn test_reset_empties_scope() {
        let mut tracker = MilestoneTracker::new();
        tracker.observe(100);
        assert_eq!(tracker.fired().len(), 4);

        tracker.reset();
        assert!(tracker.fired().is_empty());
        assert_eq!(tracker.observe(30), vec![Milestone::P25]);
    }

    #[test]
    fn test_ratio_to_percent_rounds_and_clamps() {
        assert_eq!(ratio_to_percent(0.494), 49);
        assert_eq!(ratio_to_percent(0.496), 50);
        assert_eq!(ratio_to_percent(2.0), 100);
        assert_eq!(ratio_to_percent(-0.3), 0);
        assert_eq!(ratio_to_percent(f64::NAN), 0);
    }

    #[test]
    fn test_milestone_serializes_as_integer() {
        let json = serde_json::to_string(&Milestone::P75).unwrap();
        assert_eq!(json, "75");

        let parsed: Milestone = serde_json::from_str("50").unwrap();
        assert_eq!(parsed, Milestone::P50);

        assert!(serde_json::from_str::<Milestone>("60").is_err());
    }
}
