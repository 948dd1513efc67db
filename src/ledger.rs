use crate::error::{LandUseError, Result};
use crate::schema::{DeductionCategory, LedgerResult, LedgerStep, StepKind, ZeroCrossingInfo};
use crate::utils::{approx_eq, AREA_TOLERANCE};
use log::debug;

pub const START_LABEL: &str = "Área Total (início)";
pub const FINAL_LABEL: &str = "Resultado Final";

/// Where the running balance stands relative to the single allowed crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Balance is still strictly positive and no category has reached zero.
    BeforeCrossing,
    /// Balance reached zero (or started at or below it); everything left is applied in full.
    AtOrAfterCrossing,
}

/// Single forward pass over an ordered category list.
pub struct LedgerBuilder {
    starting_balance: f64,
    balance: f64,
    phase: Phase,
    steps: Vec<LedgerStep>,
    crossing: Option<ZeroCrossingInfo>,
}

impl LedgerBuilder {
    pub fn new(starting_balance: f64) -> Self {
        // Zero is handled by the first category as a zero-magnitude crossing
        let phase = if starting_balance < 0.0 {
            Phase::AtOrAfterCrossing
        } else {
            Phase::BeforeCrossing
        };

        let mut builder = Self {
            starting_balance,
            balance: starting_balance,
            phase,
            steps: Vec::new(),
            crossing: None,
        };
        builder.push(
            START_LABEL.to_string(),
            None,
            starting_balance,
            starting_balance,
            StepKind::Start,
        );
        builder
    }

    pub fn apply(&mut self, category: &DeductionCategory) {
        let amount = category.amount;

        match self.phase {
            Phase::AtOrAfterCrossing => self.deduct_in_full(category),
            Phase::BeforeCrossing if amount < self.balance - AREA_TOLERANCE => {
                self.deduct_in_full(category)
            }
            Phase::BeforeCrossing => {
                let needed = self.balance;
                let surplus = amount - needed;

                debug!(
                    "Balance reaches zero on '{}' (consumed {}, surplus {})",
                    category.name, needed, surplus
                );

                self.balance = 0.0;
                self.push(
                    deduction_label(&category.name),
                    Some(category.name.clone()),
                    -needed,
                    0.0,
                    StepKind::ZeroCrossing,
                );
                self.crossing = Some(ZeroCrossingInfo {
                    category_name: category.name.clone(),
                    amount_consumed_to_zero: needed,
                });
                self.phase = Phase::AtOrAfterCrossing;

                // Residue below the tolerance is summation noise, not a surplus
                if surplus > AREA_TOLERANCE {
                    self.balance = -surplus;
                    self.push(
                        surplus_label(&category.name),
                        Some(category.name.clone()),
                        -surplus,
                        -surplus,
                        StepKind::Surplus,
                    );
                }
            }
        }
    }

    pub fn finish(mut self) -> LedgerResult {
        let balance = self.balance;
        self.push(FINAL_LABEL.to_string(), None, balance, balance, StepKind::Final);

        LedgerResult {
            steps: self.steps,
            starting_balance: self.starting_balance,
            final_balance: positive_zero(balance),
            crossing: self.crossing,
        }
    }

    fn deduct_in_full(&mut self, category: &DeductionCategory) {
        self.balance -= category.amount;
        let balance = self.balance;
        self.push(
            deduction_label(&category.name),
            Some(category.name.clone()),
            -category.amount,
            balance,
            StepKind::FullDeduction,
        );
    }

    fn push(
        &mut self,
        label: String,
        category: Option<String>,
        delta: f64,
        running_balance: f64,
        kind: StepKind,
    ) {
        self.steps.push(LedgerStep {
            sequence: self.steps.len() + 1,
            label,
            category,
            delta: positive_zero(delta),
            running_balance: positive_zero(running_balance),
            kind,
        });
    }
}

// Negating a zero amount yields -0.0, which would print as "-0.0000"
fn positive_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

pub fn deduction_label(name: &str) -> String {
    format!("Descontar {}", name)
}

pub fn surplus_label(name: &str) -> String {
    format!("Excedente de {}", name)
}

/// Builds the deduction ledger for one starting balance and ordered category list.
pub fn build_ledger(starting_balance: f64, categories: &[DeductionCategory]) -> Result<LedgerResult> {
    validate_inputs(starting_balance, categories)?;

    let mut builder = LedgerBuilder::new(starting_balance);
    for category in categories {
        builder.apply(category);
    }
    Ok(builder.finish())
}

fn validate_inputs(starting_balance: f64, categories: &[DeductionCategory]) -> Result<()> {
    if !starting_balance.is_finite() {
        return Err(LandUseError::NonFiniteStartingBalance(starting_balance));
    }

    if categories.is_empty() {
        return Err(LandUseError::EmptyCategoryList);
    }

    for category in categories {
        if !category.amount.is_finite() {
            return Err(LandUseError::NonFiniteCategoryAmount {
                category: category.name.clone(),
                amount: category.amount,
            });
        }
        if category.amount < 0.0 {
            return Err(LandUseError::NegativeCategoryAmount {
                category: category.name.clone(),
                amount: category.amount,
            });
        }
    }

    Ok(())
}

/// Checks the structural invariants of a ledger.
///
/// Step linkage is exact for every delta step; START and FINAL are absolute markers.
pub fn verify_ledger(result: &LedgerResult) -> Result<()> {
    let violation = |step: usize, details: String| LandUseError::InvariantViolation { step, details };

    let first = result
        .steps
        .first()
        .ok_or_else(|| violation(0, "Ledger has no steps".to_string()))?;
    if first.kind != StepKind::Start || first.running_balance != result.starting_balance {
        return Err(violation(
            first.sequence,
            "First step must be START carrying the starting balance".to_string(),
        ));
    }

    let last = result
        .steps
        .last()
        .ok_or_else(|| violation(0, "Ledger has no steps".to_string()))?;
    if last.kind != StepKind::Final || last.running_balance != result.final_balance {
        return Err(violation(
            last.sequence,
            "Last step must be FINAL carrying the final balance".to_string(),
        ));
    }

    let mut crossings = 0;
    for (idx, pair) in result.steps.windows(2).enumerate() {
        let (prev, step) = (&pair[0], &pair[1]);

        if step.sequence != idx + 2 {
            return Err(violation(step.sequence, "Sequence numbers are not contiguous".to_string()));
        }

        match step.kind {
            StepKind::Start => {
                return Err(violation(step.sequence, "START may only open the ledger".to_string()));
            }
            StepKind::Final => {
                if idx + 2 != result.steps.len() {
                    return Err(violation(step.sequence, "FINAL may only close the ledger".to_string()));
                }
                if step.delta != step.running_balance || step.running_balance != prev.running_balance {
                    return Err(violation(
                        step.sequence,
                        "FINAL must restate the last running balance".to_string(),
                    ));
                }
                continue;
            }
            StepKind::ZeroCrossing => {
                crossings += 1;
                if step.running_balance != 0.0 {
                    return Err(violation(step.sequence, "Crossing must land exactly on zero".to_string()));
                }
            }
            StepKind::Surplus => {
                let follows_crossing = prev.kind == StepKind::ZeroCrossing && prev.category == step.category;
                if !follows_crossing || step.delta >= 0.0 {
                    return Err(violation(
                        step.sequence,
                        "SURPLUS must directly follow the crossing of the same category".to_string(),
                    ));
                }
            }
            StepKind::FullDeduction => {}
        }

        if prev.running_balance + step.delta != step.running_balance {
            return Err(violation(
                step.sequence,
                format!(
                    "Running balance {} does not equal {} + {}",
                    step.running_balance, prev.running_balance, step.delta
                ),
            ));
        }
    }

    if crossings > 1 {
        return Err(violation(0, format!("Found {} crossings, at most one allowed", crossings)));
    }

    match (&result.crossing, result.crossing_step()) {
        (Some(info), Some(step)) => {
            let before = result.steps[step.sequence - 2].running_balance;
            if step.category.as_deref() != Some(info.category_name.as_str())
                || !approx_eq(info.amount_consumed_to_zero, before, AREA_TOLERANCE)
            {
                return Err(violation(
                    step.sequence,
                    "Crossing info does not match the crossing step".to_string(),
                ));
            }
        }
        (None, None) => {}
        _ => {
            return Err(violation(0, "Crossing info and crossing step disagree".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(items: &[(&str, f64)]) -> Vec<DeductionCategory> {
        items
            .iter()
            .map(|(name, amount)| DeductionCategory::new(*name, *amount))
            .collect()
    }

    fn kinds(result: &LedgerResult) -> Vec<StepKind> {
        result.steps.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_crossing_with_surplus() {
        let result = build_ledger(100.0, &cats(&[("A", 30.0), ("B", 40.0), ("C", 50.0)])).unwrap();

        assert_eq!(
            kinds(&result),
            vec![
                StepKind::Start,
                StepKind::FullDeduction,
                StepKind::FullDeduction,
                StepKind::ZeroCrossing,
                StepKind::Surplus,
                StepKind::Final,
            ]
        );
        assert_eq!(result.steps[1].running_balance, 70.0);
        assert_eq!(result.steps[2].running_balance, 30.0);
        assert_eq!(result.steps[3].delta, -30.0);
        assert_eq!(result.steps[3].running_balance, 0.0);
        assert_eq!(result.steps[4].delta, -20.0);
        assert_eq!(result.final_balance, -20.0);

        let crossing = result.crossing.clone().unwrap();
        assert_eq!(crossing.category_name, "C");
        assert_eq!(crossing.amount_consumed_to_zero, 30.0);
        assert_eq!(result.surplus(), 20.0);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_no_crossing() {
        let result = build_ledger(100.0, &cats(&[("A", 30.0), ("B", 20.0)])).unwrap();
        assert_eq!(result.final_balance, 50.0);
        assert!(result.crossing.is_none());
        assert!(!result.is_fully_consumed());
        assert_eq!(result.steps.len(), 4);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_zero_start_is_pure_surplus() {
        let result = build_ledger(0.0, &cats(&[("A", 10.0)])).unwrap();
        assert_eq!(
            kinds(&result),
            vec![StepKind::Start, StepKind::ZeroCrossing, StepKind::Surplus, StepKind::Final]
        );
        let crossing = result.crossing.clone().unwrap();
        assert_eq!(crossing.category_name, "A");
        assert_eq!(crossing.amount_consumed_to_zero, 0.0);
        assert_eq!(result.surplus(), 10.0);
        assert_eq!(result.final_balance, -10.0);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_zero_start_zero_amount_records_degenerate_crossing() {
        let result = build_ledger(0.0, &cats(&[("A", 0.0), ("B", 5.0)])).unwrap();
        assert_eq!(
            kinds(&result),
            vec![StepKind::Start, StepKind::ZeroCrossing, StepKind::FullDeduction, StepKind::Final]
        );
        assert_eq!(result.crossing.as_ref().unwrap().category_name, "A");
        assert_eq!(result.final_balance, -5.0);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_all_zero_amounts() {
        let result = build_ledger(50.0, &cats(&[("A", 0.0), ("B", 0.0)])).unwrap();
        assert_eq!(
            kinds(&result),
            vec![StepKind::Start, StepKind::FullDeduction, StepKind::FullDeduction, StepKind::Final]
        );
        assert!(result.steps[1..3].iter().all(|s| s.delta == 0.0));
        assert_eq!(result.final_balance, 50.0);
        assert!(result.crossing.is_none());
    }

    #[test]
    fn test_exact_consumption_has_no_surplus_step() {
        let result = build_ledger(100.0, &cats(&[("A", 100.0)])).unwrap();
        assert_eq!(
            kinds(&result),
            vec![StepKind::Start, StepKind::ZeroCrossing, StepKind::Final]
        );
        assert_eq!(result.crossing.as_ref().unwrap().amount_consumed_to_zero, 100.0);
        assert!(result.surplus_step().is_none());
        assert_eq!(result.final_balance, 0.0);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_decimal_exact_consumption_lands_on_zero() {
        // 0.3 - 0.1 leaves 0.19999999999999998, just under the 0.2 that follows
        let result = build_ledger(0.3, &cats(&[("A", 0.1), ("B", 0.2)])).unwrap();
        assert_eq!(
            kinds(&result),
            vec![StepKind::Start, StepKind::FullDeduction, StepKind::ZeroCrossing, StepKind::Final]
        );
        assert_eq!(result.crossing.as_ref().unwrap().category_name, "B");
        assert!(result.surplus_step().is_none());
        assert_eq!(result.final_balance, 0.0);
        assert!(result.final_balance.is_sign_positive());
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_repeated_tenths_consume_total_exactly() {
        let tenths: Vec<DeductionCategory> = (0..10)
            .map(|i| DeductionCategory::new(format!("T{}", i), 0.1))
            .collect();
        let result = build_ledger(1.0, &tenths).unwrap();

        let crossing = result.crossing.clone().expect("last tenth consumes the total");
        assert_eq!(crossing.category_name, "T9");
        assert!(result.is_fully_consumed());
        assert!(result.surplus_step().is_none());
        assert_eq!(result.final_balance, 0.0);
        assert_eq!(result.steps.len(), 12);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_surplus_above_tolerance_is_kept() {
        let result = build_ledger(0.3, &cats(&[("A", 0.1), ("B", 0.2001)])).unwrap();
        assert_eq!(result.surplus_step().map(|s| s.kind), Some(StepKind::Surplus));
        assert!(approx_eq(result.surplus(), 0.0001, AREA_TOLERANCE));
    }

    #[test]
    fn test_categories_after_crossing_apply_in_full() {
        let result = build_ledger(10.0, &cats(&[("A", 4.0), ("B", 10.0), ("C", 3.0)])).unwrap();
        let last_deduction = &result.steps[result.steps.len() - 2];
        assert_eq!(last_deduction.kind, StepKind::FullDeduction);
        assert_eq!(last_deduction.category.as_deref(), Some("C"));
        assert_eq!(last_deduction.running_balance, -7.0);
        assert_eq!(result.final_balance, -7.0);
        assert_eq!(
            result.steps.iter().filter(|s| s.kind == StepKind::ZeroCrossing).count(),
            1
        );
    }

    #[test]
    fn test_negative_start_never_crosses() {
        let result = build_ledger(-5.0, &cats(&[("A", 1.0), ("B", 2.0)])).unwrap();
        assert!(result.crossing.is_none());
        assert!(result
            .deduction_steps()
            .all(|s| s.kind == StepKind::FullDeduction));
        assert_eq!(result.final_balance, -8.0);
        verify_ledger(&result).unwrap();
    }

    #[test]
    fn test_final_step_restates_balance() {
        let result = build_ledger(100.0, &cats(&[("A", 30.0)])).unwrap();
        let last = result.steps.last().unwrap();
        assert_eq!(last.kind, StepKind::Final);
        assert_eq!(last.delta, 70.0);
        assert_eq!(last.running_balance, 70.0);
        assert_eq!(last.label, FINAL_LABEL);
        assert_eq!(result.steps[0].label, START_LABEL);
        assert_eq!(result.steps[1].label, "Descontar A");
    }

    #[test]
    fn test_precondition_violations() {
        let err = build_ledger(f64::NAN, &cats(&[("A", 1.0)])).unwrap_err();
        assert!(matches!(err, LandUseError::NonFiniteStartingBalance(_)));
        assert!(err.is_precondition_violation());

        let err = build_ledger(10.0, &[]).unwrap_err();
        assert!(matches!(err, LandUseError::EmptyCategoryList));

        let err = build_ledger(10.0, &cats(&[("A", -1.0)])).unwrap_err();
        assert!(matches!(err, LandUseError::NegativeCategoryAmount { .. }));

        let err = build_ledger(10.0, &cats(&[("A", f64::INFINITY)])).unwrap_err();
        assert!(matches!(err, LandUseError::NonFiniteCategoryAmount { .. }));
    }

    #[test]
    fn test_verify_rejects_tampered_ledger() {
        let mut result = build_ledger(100.0, &cats(&[("A", 30.0), ("B", 90.0)])).unwrap();
        result.steps[1].running_balance = 71.0;
        assert!(matches!(
            verify_ledger(&result),
            Err(LandUseError::InvariantViolation { step: 2, .. })
        ));
    }
}
