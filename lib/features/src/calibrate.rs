//! Agreement of a rule table with hand-labeled cases.
//!
//! Before trusting a changed [`RuleTable`] across a corpus, score a set of
//! labeled sources with it and look at per-axis agreement and the cases it
//! gets wrong.

use crate::error::Result;
use crate::personality::{BrandPersonalityScorer, Energy, RuleTable, SignalValues, Tone, TrustLevel};
use serde::{Deserialize, Serialize};

/// Expected labels; an axis left `None` is not checked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpectedLabels {
    pub tone: Option<Tone>,
    pub energy: Option<Energy>,
    pub trust_level: Option<TrustLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledCase {
    pub name: String,
    pub signals: SignalValues,
    pub expected: ExpectedLabels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisAgreement {
    pub matched: usize,
    pub total: usize,
}

impl AxisAgreement {
    fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.matched += 1;
        }
    }

    /// Share of checked cases that matched; `None` if the axis was never checked
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.matched as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub case: String,
    pub axis: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub cases: usize,
    pub tone: AxisAgreement,
    pub energy: AxisAgreement,
    pub trust_level: AxisAgreement,
    pub mismatches: Vec<Mismatch>,
}

fn check<L: PartialEq + Copy>(
    agreement: &mut AxisAgreement,
    mismatches: &mut Vec<Mismatch>,
    case: &str,
    axis: &str,
    expected: Option<L>,
    actual: L,
    label: fn(L) -> &'static str,
) {
    let Some(expected) = expected else { return };
    let hit = expected == actual;
    agreement.record(hit);
    if !hit {
        mismatches.push(Mismatch {
            case: case.to_string(),
            axis: axis.to_string(),
            expected: label(expected).to_string(),
            actual: label(actual).to_string(),
        });
    }
}

/// Score every case with `rules` and tally agreement per axis
pub fn calibrate(rules: &RuleTable, cases: &[LabeledCase]) -> Result<CalibrationReport> {
    let scorer = BrandPersonalityScorer::new(rules.clone())?;
    let mut report = CalibrationReport {
        cases: cases.len(),
        ..Default::default()
    };

    for case in cases {
        let p = scorer.evaluate(&case.signals);
        check(
            &mut report.tone,
            &mut report.mismatches,
            &case.name,
            "tone",
            case.expected.tone,
            p.tone,
            |t| Tone::LABELS[t.index()],
        );
        check(
            &mut report.energy,
            &mut report.mismatches,
            &case.name,
            "energy",
            case.expected.energy,
            p.energy,
            |e| Energy::LABELS[e.index()],
        );
        check(
            &mut report.trust_level,
            &mut report.mismatches,
            &case.name,
            "trustLevel",
            case.expected.trust_level,
            p.trust_level,
            |t| TrustLevel::LABELS[t.index()],
        );
    }

    Ok(report)
}
