//! Presentation of screening results.
//!
//! The engine produces values and typed errors; this module alone turns them
//! into localized text (a force-style bar chart for the terminal) or JSON for
//! other renderers.

use std::fmt::Write as _;

use serde::Serialize;

use crate::engine::{EngineError, Inference, Label};
use crate::explain::Attribution;
use crate::locale::Locale;
use crate::model::ModelLoadError;

/// Width of the longest bar in the text chart.
const BAR_WIDTH: usize = 24;

/// A rendered view of one [`Inference`].
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    inference: &'a Inference,
    locale: Locale,
}

impl<'a> Report<'a> {
    pub fn new(inference: &'a Inference, locale: Locale) -> Self {
        Self { inference, locale }
    }

    /// Multi-line text: title, probability, verdict, contribution chart, legend, disclaimer.
    pub fn render(&self) -> String {
        let prediction = &self.inference.prediction;
        let locale = self.locale;
        let mut out = String::new();

        let _ = writeln!(out, "{}", locale.title());
        out.push('\n');
        let _ = writeln!(out, "{}", locale.probability_line(&prediction.percentage()));
        let _ = writeln!(
            out,
            "{}",
            locale.verdict_line(prediction.label, prediction.threshold)
        );
        out.push('\n');

        match &self.inference.attribution {
            Ok(attribution) => {
                let _ = writeln!(out, "{}", locale.chart_heading());
                self.render_chart(&mut out, attribution);
                let _ = writeln!(out, "{}", locale.legend());
            }
            Err(e) => {
                let _ = writeln!(out, "{}", locale.explanation_failed(&e.to_string()));
            }
        }

        out.push('\n');
        let _ = writeln!(out, "{}", locale.disclaimer());
        out
    }

    fn render_chart(&self, out: &mut String, attribution: &Attribution) {
        let rows: Vec<_> = attribution
            .by_magnitude()
            .into_iter()
            .map(|c| (self.locale.feature_label(c.feature), c))
            .collect();
        let label_width = rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let max_abs = rows
            .iter()
            .map(|(_, c)| c.contribution.abs())
            .fold(0.0, f64::max);

        for (label, c) in &rows {
            let pad = label_width - label.chars().count();
            let bar = bar(c.contribution, max_abs);
            let _ = writeln!(
                out,
                "  {label}{:pad$} = {:>9.2}  {:>+9.4}  {bar}",
                "", c.value, c.contribution
            );
        }
        let _ = writeln!(
            out,
            "  {}: {:.4} | {}: {:.4}",
            self.locale.baseline_label(),
            attribution.baseline,
            self.locale.output_label(),
            attribution.total()
        );
    }

    /// Machine-readable form of the report.
    pub fn to_json(&self) -> ReportJson {
        let prediction = &self.inference.prediction;
        let (attribution, explanation_error) = match &self.inference.attribution {
            Ok(attribution) => (
                Some(AttributionJson {
                    baseline: attribution.baseline,
                    contributions: attribution
                        .contributions
                        .iter()
                        .map(|c| ContributionJson {
                            feature: c.feature,
                            label: self.locale.feature_label(c.feature),
                            value: c.value,
                            contribution: c.contribution,
                        })
                        .collect(),
                }),
                None,
            ),
            Err(e) => (None, Some(self.locale.explanation_failed(&e.to_string()))),
        };
        ReportJson {
            probability: prediction.probability,
            percentage: prediction.percentage(),
            margin: prediction.margin,
            label: prediction.label,
            verdict: self.locale.verdict(prediction.label),
            threshold: prediction.threshold,
            attribution,
            explanation_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportJson {
    pub probability: f64,
    pub percentage: String,
    pub margin: f64,
    pub label: Label,
    pub verdict: &'static str,
    pub threshold: f64,
    pub attribution: Option<AttributionJson>,
    pub explanation_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionJson {
    pub baseline: f64,
    pub contributions: Vec<ContributionJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionJson {
    pub feature: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub contribution: f64,
}

/// `+` bars for positive contributions, `-` bars for negative, scaled to the largest.
fn bar(contribution: f64, max_abs: f64) -> String {
    if max_abs <= 0.0 || !contribution.is_finite() {
        return String::new();
    }
    let len = ((contribution.abs() / max_abs) * BAR_WIDTH as f64).round() as usize;
    let ch = if contribution >= 0.0 { '+' } else { '-' };
    std::iter::repeat(ch).take(len.max(1)).collect()
}

/// User message for a model that could not be loaded.
pub fn load_error_message(locale: Locale, error: &ModelLoadError) -> String {
    locale.load_failed(&error.to_string())
}

/// User message for a request the engine could not score.
pub fn engine_error_message(locale: Locale, error: &EngineError) -> String {
    match error {
        EngineError::Unsupported(_) => locale.unsupported_model().to_string(),
        other => locale.error_occurred(&other.to_string()),
    }
}
