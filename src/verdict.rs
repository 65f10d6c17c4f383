//! Final verdict taxonomy (spec §7), generalized from the teacher's
//! `core::verdict::Verdict` enum (`Accepted | WrongAnswer | ... | Skipped`)
//! to the seven abbreviations spec.md's judge layer actually emits. `PA`
//! (partial accept) has no counterpart in the teacher's ICPC-only judger —
//! it exists here because this crate's scoring is weighted instead of
//! all-or-nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// All tests passed.
    AC,
    /// Some weight passed, no higher-priority failure present.
    PA,
    /// At least one wrong comparison, no RE/TLE/MLE.
    WA,
    /// Compile phase failed.
    CE,
    /// Runtime crash, protocol violation, per-test `ERROR` status, or a
    /// non-time/memory infrastructure fault.
    RE,
    /// Engine-level timeout.
    TLE,
    /// Engine-level out-of-memory.
    MLE,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::AC => "AC",
            Verdict::PA => "PA",
            Verdict::WA => "WA",
            Verdict::CE => "CE",
            Verdict::RE => "RE",
            Verdict::TLE => "TLE",
            Verdict::MLE => "MLE",
        };
        write!(f, "{s}")
    }
}

impl Verdict {
    /// A `TestResult` has `passed=true` iff `verdict=AC` (spec §3 invariant).
    pub fn passed(self) -> bool {
        matches!(self, Verdict::AC)
    }

    /// Aggregate priority when more than one non-AC verdict is present
    /// across a batch of per-test outcomes (spec §4.5 "Aggregation").
    /// Lower rank wins.
    fn priority_rank(self) -> u8 {
        match self {
            Verdict::RE => 0,
            Verdict::TLE => 1,
            Verdict::MLE => 2,
            Verdict::CE => 3,
            Verdict::WA => 4,
            Verdict::PA => 5,
            Verdict::AC => 6,
        }
    }

    /// Given the set of verdicts observed across a judged batch and the
    /// aggregate `score`, pick the overall submission verdict per spec
    /// §4.5's priority rule: `score == 1.0 => AC`; else RE beats TLE beats
    /// MLE beats WA (which becomes PA when `score > 0`).
    pub fn aggregate(test_verdicts: &[Verdict], score: f64) -> Verdict {
        if score >= 1.0 {
            return Verdict::AC;
        }
        let worst = test_verdicts
            .iter()
            .copied()
            .min_by_key(|v| v.priority_rank());
        match worst {
            Some(Verdict::RE) => Verdict::RE,
            Some(Verdict::TLE) => Verdict::TLE,
            Some(Verdict::MLE) => Verdict::MLE,
            Some(Verdict::WA) | Some(Verdict::PA) => {
                if score > 0.0 {
                    Verdict::PA
                } else {
                    Verdict::WA
                }
            }
            _ => Verdict::AC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_iff_ac() {
        assert!(Verdict::AC.passed());
        assert!(!Verdict::WA.passed());
        assert!(!Verdict::PA.passed());
    }

    #[test]
    fn aggregate_all_passed_is_ac() {
        assert_eq!(Verdict::aggregate(&[Verdict::AC, Verdict::AC], 1.0), Verdict::AC);
    }

    #[test]
    fn aggregate_wa_with_partial_score_is_pa() {
        let verdicts = [Verdict::AC, Verdict::WA];
        assert_eq!(Verdict::aggregate(&verdicts, 0.5), Verdict::PA);
    }

    #[test]
    fn aggregate_wa_with_zero_score_is_wa() {
        let verdicts = [Verdict::WA, Verdict::WA];
        assert_eq!(Verdict::aggregate(&verdicts, 0.0), Verdict::WA);
    }

    #[test]
    fn aggregate_re_beats_wa() {
        let verdicts = [Verdict::WA, Verdict::RE];
        assert_eq!(Verdict::aggregate(&verdicts, 0.0), Verdict::RE);
    }

    #[test]
    fn aggregate_tle_beats_wa_but_not_re() {
        assert_eq!(Verdict::aggregate(&[Verdict::TLE, Verdict::WA], 0.0), Verdict::TLE);
        assert_eq!(Verdict::aggregate(&[Verdict::TLE, Verdict::RE], 0.0), Verdict::RE);
    }
}
