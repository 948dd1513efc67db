//! Read-only views over a [`LedgerResult`] for the presentation layer:
//! delimited-text export, timeline entries, waterfall series and markdown.

use crate::error::Result;
use crate::schema::{DeductionCategory, LedgerResult, LedgerStep, StepKind, ZeroCrossingInfo};
use crate::utils::{br, round_to, DISPLAY_PLACES};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const CSV_HEADER: [&str; 5] = ["sequence", "label", "delta", "running_balance", "kind"];

/// Writes one row per ledger step with values fixed at four decimals.
pub fn write_ledger_csv<W: Write>(result: &LedgerResult, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for step in &result.steps {
        csv_writer.write_record([
            step.sequence.to_string(),
            step.label.clone(),
            fixed(step.delta),
            fixed(step.running_balance),
            step.kind.as_str().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

// Adding +0.0 turns a rounded -0.0 into 0.0
fn fixed(value: f64) -> String {
    format!("{:.*}", DISPLAY_PLACES, round_to(value, DISPLAY_PLACES) + 0.0)
}

pub fn ledger_to_csv(result: &LedgerResult) -> Result<String> {
    let mut buffer = Vec::new();
    write_ledger_csv(result, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimelineBadge {
    Start,
    Deduction,
    Adjustment,
    Result,
}

impl TimelineBadge {
    pub fn label(&self) -> &'static str {
        match self {
            TimelineBadge::Start => "início",
            TimelineBadge::Deduction => "desconto",
            TimelineBadge::Adjustment => "ajuste",
            TimelineBadge::Result => "resultado",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineEntry {
    pub sequence: usize,
    pub title: String,
    pub badge: TimelineBadge,
    pub kind: StepKind,
    pub delta: f64,
    pub running_balance: f64,
    /// e.g. "100.0000 - 30.0000 = 70.0000"
    pub formula: String,
}

pub fn timeline(result: &LedgerResult) -> Vec<TimelineEntry> {
    let mut previous: Option<&LedgerStep> = None;

    result
        .steps
        .iter()
        .map(|step| {
            let badge = match step.kind {
                StepKind::Start => TimelineBadge::Start,
                StepKind::Final => TimelineBadge::Result,
                _ if step.delta < 0.0 => TimelineBadge::Deduction,
                _ => TimelineBadge::Adjustment,
            };

            let formula = match (step.kind.is_absolute(), previous) {
                (false, Some(prev)) => format!(
                    "{:.p$} - {:.p$} = {:.p$}",
                    prev.running_balance,
                    -step.delta + 0.0,
                    step.running_balance,
                    p = DISPLAY_PLACES
                ),
                _ => format!("{:.p$}", step.running_balance, p = DISPLAY_PLACES),
            };

            previous = Some(step);

            TimelineEntry {
                sequence: step.sequence,
                title: step.label.clone(),
                badge,
                kind: step.kind,
                delta: step.delta,
                running_balance: step.running_balance,
                formula,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Bar drawn from zero (opening balance)
    Absolute,
    /// Bar drawn from the previous bar's end
    Relative,
    /// Bar drawn from zero summarising everything before it
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    None,
    Crossing,
    Surplus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WaterfallPoint {
    pub label: String,
    pub value: f64,
    pub measure: Measure,
    pub highlight: Highlight,
}

pub fn waterfall_series(result: &LedgerResult) -> Vec<WaterfallPoint> {
    result
        .steps
        .iter()
        .map(|step| {
            let (measure, highlight) = match step.kind {
                StepKind::Start => (Measure::Absolute, Highlight::None),
                StepKind::Final => (Measure::Total, Highlight::None),
                StepKind::FullDeduction => (Measure::Relative, Highlight::None),
                StepKind::ZeroCrossing => (Measure::Relative, Highlight::Crossing),
                StepKind::Surplus => (Measure::Relative, Highlight::Surplus),
            };

            let label = match (&step.category, step.kind) {
                (Some(name), StepKind::Surplus) => format!("− {} (excedente)", name),
                (Some(name), _) => format!("− {}", name),
                (None, _) => step.label.clone(),
            };

            WaterfallPoint {
                label,
                value: step.delta,
                measure,
                highlight,
            }
        })
        .collect()
}

pub fn timeline_markdown(result: &LedgerResult) -> String {
    let mut output = String::new();

    output.push_str("## Linha do tempo dos cálculos\n\n");
    for entry in timeline(result) {
        let marker = match entry.kind {
            StepKind::ZeroCrossing => " ⚑ **[ZERO]**",
            _ => "",
        };
        let sign = if entry.delta < 0.0 { "−" } else { "+" };

        output.push_str(&format!(
            "{}. **{}** _{}_{}\n",
            entry.sequence,
            entry.title,
            entry.badge.label(),
            marker
        ));
        output.push_str(&format!("   - Variação: {} ({})\n", br(entry.delta), sign));
        output.push_str(&format!("   - Acumulado: {}\n", br(entry.running_balance)));
        output.push_str(&format!("   - Fórmula: `{}`\n", entry.formula));
    }

    output
}

/// Headline figures shown alongside the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LandUseSummary {
    pub total_area: f64,
    pub categories: Vec<DeductionCategory>,
    pub total_deducted: f64,
    pub final_balance: f64,
    pub crossing: Option<ZeroCrossingInfo>,
    pub matched_rows: usize,
}

impl LandUseSummary {
    pub fn new(categories: &[DeductionCategory], result: &LedgerResult, matched_rows: usize) -> Self {
        Self {
            total_area: result.starting_balance,
            categories: categories.to_vec(),
            total_deducted: categories.iter().map(|c| c.amount).sum(),
            final_balance: result.final_balance,
            crossing: result.crossing.clone(),
            matched_rows,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("## Dados Agregados\n\n");
        output.push_str(&format!("- Área Total (manual): {}\n", br(self.total_area)));
        for category in &self.categories {
            output.push_str(&format!("- {} (soma): {}\n", category.name, br(category.amount)));
        }
        output.push_str(&format!("- Linhas selecionadas: {}\n\n", self.matched_rows));

        output.push_str("## Resultado Final\n\n");
        output.push_str(&format!(
            "- Saldo após todos os descontos: {}\n",
            br(self.final_balance)
        ));
        match &self.crossing {
            Some(crossing) => output.push_str(&format!(
                "- Área Total consumida em: {} ({} até zerar)\n",
                crossing.category_name,
                br(crossing.amount_consumed_to_zero)
            )),
            None => output.push_str("- Área Total não foi totalmente consumida\n"),
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::build_ledger;

    fn sample() -> LedgerResult {
        build_ledger(
            100.0,
            &[
                DeductionCategory::new("A", 30.0),
                DeductionCategory::new("B", 40.0),
                DeductionCategory::new("C", 50.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ledger_to_csv() {
        let csv = ledger_to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "sequence,label,delta,running_balance,kind");
        assert_eq!(lines[1], "1,Área Total (início),100.0000,100.0000,START");
        assert_eq!(lines[2], "2,Descontar A,-30.0000,70.0000,FULL_DEDUCTION");
        assert_eq!(lines[4], "4,Descontar C,-30.0000,0.0000,ZERO_CROSSING");
        assert_eq!(lines[5], "5,Excedente de C,-20.0000,-20.0000,SURPLUS");
        assert_eq!(lines[6], "6,Resultado Final,-20.0000,-20.0000,FINAL");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_ledger_to_csv_exact_decimal_consumption() {
        let ledger = build_ledger(
            0.3,
            &[DeductionCategory::new("A", 0.1), DeductionCategory::new("B", 0.2)],
        )
        .unwrap();
        let csv = ledger_to_csv(&ledger).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[3], "3,Descontar B,-0.2000,0.0000,ZERO_CROSSING");
        assert_eq!(lines[4], "4,Resultado Final,0.0000,0.0000,FINAL");
        assert!(!csv.contains("-0.0000"));
        assert!(!csv.contains("SURPLUS"));
    }

    #[test]
    fn test_timeline_formulas() {
        let entries = timeline(&sample());
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].formula, "100.0000");
        assert_eq!(entries[0].badge, TimelineBadge::Start);
        assert_eq!(entries[1].formula, "100.0000 - 30.0000 = 70.0000");
        assert_eq!(entries[1].badge, TimelineBadge::Deduction);
        assert_eq!(entries[3].formula, "30.0000 - 30.0000 = 0.0000");
        assert_eq!(entries[4].formula, "0.0000 - 20.0000 = -20.0000");
        assert_eq!(entries[5].badge, TimelineBadge::Result);
    }

    #[test]
    fn test_zero_delta_is_adjustment() {
        let result = build_ledger(10.0, &[DeductionCategory::new("A", 0.0)]).unwrap();
        let entries = timeline(&result);
        assert_eq!(entries[1].badge, TimelineBadge::Adjustment);
        assert_eq!(entries[1].formula, "10.0000 - 0.0000 = 10.0000");
    }

    #[test]
    fn test_waterfall_series() {
        let points = waterfall_series(&sample());
        let measures: Vec<Measure> = points.iter().map(|p| p.measure).collect();
        assert_eq!(
            measures,
            vec![
                Measure::Absolute,
                Measure::Relative,
                Measure::Relative,
                Measure::Relative,
                Measure::Relative,
                Measure::Total,
            ]
        );
        assert_eq!(points[3].highlight, Highlight::Crossing);
        assert_eq!(points[4].highlight, Highlight::Surplus);
        assert_eq!(points[4].label, "− C (excedente)");
        assert_eq!(points[1].label, "− A");
        assert_eq!(points[5].value, -20.0);

        let json = serde_json::to_string(&points[0]).unwrap();
        assert!(json.contains("\"absolute\""));
    }

    #[test]
    fn test_markdown_outputs() {
        let result = sample();
        let markdown = timeline_markdown(&result);
        assert!(markdown.contains("Linha do tempo"));
        assert!(markdown.contains("[ZERO]"));
        assert!(markdown.contains("-20,0000"));

        let categories = vec![
            DeductionCategory::new("A", 30.0),
            DeductionCategory::new("B", 40.0),
            DeductionCategory::new("C", 50.0),
        ];
        let summary = LandUseSummary::new(&categories, &result, 3);
        assert_eq!(summary.total_deducted, 120.0);
        let markdown = summary.to_markdown();
        assert!(markdown.contains("Área Total consumida em: C (30,0000 até zerar)"));
        assert!(markdown.contains("Linhas selecionadas: 3"));
    }
}
