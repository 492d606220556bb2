//! Output payloads: JSON via serde, and a plain-text summary for terminals.

use serde::Serialize;
use std::fmt::Write;

use crate::analysis::spectral::Direction;
use crate::pipeline::{Evaluation, Measurement};
use crate::scoring::{DeltaTransformation, MetricResult, Status};

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub input: String,
    pub genre: &'a str,
    pub iteration: usize,
    #[serde(flatten)]
    pub evaluation: &'a Evaluation,
}

impl Report<'_> {
    /// Non-finite values (the -inf peak of silence) serialize as `null`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        let analysis = &self.evaluation.analysis;
        let score = &self.evaluation.score;

        writeln!(
            out,
            "#{} {} [{}] {:.1}s @ {} Hz",
            self.iteration, self.input, self.genre, analysis.duration_s, analysis.sample_rate
        )?;
        writeln!(
            out,
            "  Score: {:.1}% ({}), {} of {} metrics scored",
            score.total_score_pct,
            score.classification.label(),
            score.scored_metrics,
            score.per_metric.len()
        )?;

        if let Measurement::Measured(tp) = &analysis.true_peak {
            let flag = if tp.hard {
                "CLIPPING"
            } else if tp.warn {
                "over -1 dBTP"
            } else {
                "ok"
            };
            writeln!(
                out,
                "  True peak: {} dBTP (sample {} dBFS, {:?}) {}",
                db(tp.true_peak_dbtp),
                db(tp.sample_peak_dbfs),
                tp.method,
                flag
            )?;
        }
        if let Measurement::Measured(cf) = &analysis.crest_factor {
            writeln!(
                out,
                "  Crest factor: {:.1} dB mean, {:.1} dB p95 ({})",
                cf.mean_db,
                cf.p95_db,
                cf.interpretation.label()
            )?;
        }

        writeln!(out, "  Metrics:")?;
        for metric in &score.per_metric {
            writeln!(out, "    {}", metric_line(metric))?;
        }

        if !analysis.spectral.groups.is_empty() {
            let groups: Vec<String> = analysis
                .spectral
                .groups
                .iter()
                .map(|g| format!("{}={:?}", g.group, g.color).to_lowercase())
                .collect();
            writeln!(out, "  Groups: {}", groups.join(", "))?;
        }

        if !analysis.spectral.suggestions.is_empty() {
            writeln!(out, "  Suggestions:")?;
            for s in &analysis.spectral.suggestions {
                let verb = match s.direction {
                    Direction::Boost => "boost",
                    Direction::Cut => "cut",
                };
                writeln!(
                    out,
                    "    {} {} by {:.1} dB [{}]; correction {}",
                    verb,
                    s.band,
                    s.amount_db,
                    s.status.label(),
                    DeltaTransformation::of(s.deviation_db)
                )?;
            }
        }
        Ok(())
    }
}

fn metric_line(metric: &MetricResult) -> String {
    match (metric.value, metric.score) {
        (Some(value), Some(score)) => format!(
            "{:<22} {:>8.2} (target {:.2} ±{:.2}) {:<7} {:>5.1}%",
            metric.key.to_string(),
            value,
            metric.target,
            metric.tolerance,
            metric.status.label(),
            score * 100.0
        ),
        _ => format!(
            "{:<22} {:>8} ({})",
            metric.key.to_string(),
            "-",
            metric
                .unavailable
                .map(|u| format!("{u:?}").to_lowercase())
                .unwrap_or_else(|| Status::NoData.label().to_string())
        ),
    }
}

fn db(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        "-inf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChannelBuffer;
    use crate::pipeline::{Overrides, Pipeline};
    use crate::reference::load_reference;

    fn evaluate(samples: Vec<f32>) -> Evaluation {
        let reference = load_reference("pop").unwrap();
        let buffer = ChannelBuffer::from_mono(samples, 44100).unwrap();
        Pipeline::default()
            .evaluate(&buffer, &reference, Overrides::default(), None)
            .unwrap()
    }

    #[test]
    fn silence_serializes_minus_infinity_as_null() {
        let evaluation = evaluate(vec![0.0; 44100]);
        let report = Report {
            input: "silence.wav".into(),
            genre: "pop",
            iteration: 1,
            evaluation: &evaluation,
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(json["analysis"]["true_peak"]["true_peak_dbtp"].is_null());
        assert_eq!(json["genre"], "pop");
        assert!(json["score"]["per_metric"].is_array());
    }

    #[test]
    fn text_lists_every_metric() {
        let samples: Vec<f32> = (0..44100 * 3)
            .map(|i| 0.4 * (i as f32 * 0.0627).sin())
            .collect();
        let evaluation = evaluate(samples);
        let report = Report {
            input: "tone.wav".into(),
            genre: "pop",
            iteration: 2,
            evaluation: &evaluation,
        };
        let text = report.to_text();
        assert!(text.starts_with("#2 tone.wav [pop]"));
        assert!(text.contains("Score:"));
        for metric in &evaluation.score.per_metric {
            assert!(text.contains(&metric.key.to_string()), "{}", metric.key);
        }
    }
}
