//! Safety policy mapping raw deviations onto bounded corrections.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Below this a deviation is not worth acting on.
pub const IGNORE_BELOW_DB: f64 = 0.5;
/// Start of the soft-knee zone.
pub const SOFT_KNEE_DB: f64 = 2.0;
pub const SOFT_KNEE_RATIO: f64 = 0.8;
/// No correction ever exceeds this magnitude.
pub const HARD_CAP_DB: f64 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaRule {
    Ignored,
    Linear,
    SoftKnee,
    HardCap,
}

impl DeltaRule {
    pub fn for_delta(delta: f64) -> Self {
        match delta.abs() {
            d if !d.is_finite() => Self::Ignored,
            d if d < IGNORE_BELOW_DB => Self::Ignored,
            d if d < SOFT_KNEE_DB => Self::Linear,
            d if d < HARD_CAP_DB => Self::SoftKnee,
            _ => Self::HardCap,
        }
    }
}

/// Map one raw deviation (dB) into a bounded correction.
pub fn normalize_delta(delta: f64) -> f64 {
    match DeltaRule::for_delta(delta) {
        DeltaRule::Ignored => 0.0,
        DeltaRule::Linear => delta,
        DeltaRule::SoftKnee => delta * SOFT_KNEE_RATIO,
        DeltaRule::HardCap => HARD_CAP_DB.copysign(delta),
    }
}

pub fn normalize_deltas(deltas: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    deltas
        .iter()
        .map(|(band, &delta)| (band.clone(), normalize_delta(delta)))
        .collect()
}

pub fn is_safe(value: f64) -> bool {
    value.is_finite() && value.abs() <= HARD_CAP_DB
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DeltaTransformation {
    pub input_db: f64,
    pub output_db: f64,
    pub rule: DeltaRule,
    pub reduced_by_db: f64,
}

impl DeltaTransformation {
    pub fn of(delta: f64) -> Self {
        let output_db = normalize_delta(delta);
        let input = if delta.is_finite() { delta } else { 0.0 };
        Self {
            input_db: delta,
            output_db,
            rule: DeltaRule::for_delta(delta),
            reduced_by_db: input.abs() - output_db.abs(),
        }
    }
}

impl fmt::Display for DeltaTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            DeltaRule::Ignored => write!(
                f,
                "{:+.2} dB ignored (below {:.1} dB significance)",
                self.input_db, IGNORE_BELOW_DB
            ),
            DeltaRule::Linear => write!(f, "{:+.2} dB applied unchanged", self.input_db),
            DeltaRule::SoftKnee => write!(
                f,
                "{:+.2} dB softened to {:+.2} dB (x{:.1}, reduced by {:.2} dB)",
                self.input_db, self.output_db, SOFT_KNEE_RATIO, self.reduced_by_db
            ),
            DeltaRule::HardCap => write!(
                f,
                "{:+.2} dB capped at {:+.2} dB (reduced by {:.2} dB)",
                self.input_db, self.output_db, self.reduced_by_db
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn documented_examples() {
        assert_eq!(normalize_delta(0.3), 0.0);
        assert_eq!(normalize_delta(-1.5), -1.5);
        assert!(close(normalize_delta(4.2), 3.36));
        assert_eq!(normalize_delta(-12.0), -6.0);
    }

    #[test]
    fn zone_edges() {
        assert_eq!(normalize_delta(0.4999), 0.0);
        assert_eq!(normalize_delta(0.5), 0.5);
        assert!(close(normalize_delta(2.0), 1.6));
        assert_eq!(normalize_delta(6.0), 6.0);
        assert_eq!(normalize_delta(-6.0), -6.0);
        assert_eq!(normalize_delta(f64::NAN), 0.0);
        assert_eq!(normalize_delta(f64::INFINITY), 0.0);
    }

    #[test]
    fn output_is_always_safe() {
        let mut d = -40.0;
        while d <= 40.0 {
            assert!(is_safe(normalize_delta(d)), "{d}");
            d += 0.05;
        }
        assert!(!is_safe(6.01));
        assert!(!is_safe(f64::NAN));
    }

    #[test]
    fn batch_keeps_band_keys() {
        let deltas = BTreeMap::from([("bass".to_string(), 3.0), ("sub".to_string(), -9.0)]);
        let out = normalize_deltas(&deltas);
        assert!(close(out["bass"], 2.4));
        assert_eq!(out["sub"], -6.0);
    }

    #[test]
    fn report_names_rule_and_reduction() {
        let t = DeltaTransformation::of(-12.0);
        assert_eq!(t.rule, DeltaRule::HardCap);
        assert!(close(t.reduced_by_db, 6.0));
        assert!(t.to_string().contains("capped"));

        let t = DeltaTransformation::of(0.2);
        assert_eq!(t.rule, DeltaRule::Ignored);
        assert!(t.to_string().contains("ignored"));
    }
}
