//! Verification evaluator
//!
//! Classifies a step's output against a (substituted) verification rule.
//! `expression` rules cannot be decided here: they run in the step's own
//! backend, so the evaluator hands them back to the caller.

use crate::domain::{ReportType, Severity, Verdict, Verification, VerifyType, VerifyValue};

/// Evaluator outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Passed,
    /// Failed with a default explanation (used when no `err_msg` is set)
    Failed(String),
    /// Expression to run through the step's backend
    Expression(String),
}

impl Evaluation {
    fn check(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok {
            Evaluation::Passed
        } else {
            Evaluation::Failed(reason())
        }
    }
}

/// Evaluate `output` against `verification`
///
/// `None` (no `verify` declared) always passes: the step only harvests data.
pub fn evaluate(output: &str, verification: Option<&Verification>) -> Evaluation {
    let Some(verification) = verification else {
        return Evaluation::Passed;
    };
    let output = output.trim();

    match (&verification.verify_type, &verification.value) {
        (VerifyType::Expression, VerifyValue::Scalar(expr)) => Evaluation::Expression(expr.clone()),
        (VerifyType::Equal, VerifyValue::Scalar(expected)) => {
            let expected = expected.trim();
            let equal = match (as_number(output), as_number(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => output == expected,
            };
            Evaluation::check(equal, || format!("expected '{}', got '{}'", expected, output))
        }
        (VerifyType::Min, VerifyValue::Scalar(min)) => numeric(output, min, |v, t| v >= t, ">="),
        (VerifyType::Max, VerifyValue::Scalar(max)) => numeric(output, max, |v, t| v <= t, "<="),
        (VerifyType::Between, VerifyValue::Range(lo, hi)) => {
            match (as_number(output), as_number(lo), as_number(hi)) {
                (Some(v), Some(l), Some(h)) => Evaluation::check(l <= v && v <= h, || {
                    format!("value {} not within [{}, {}]", output, lo.trim(), hi.trim())
                }),
                _ => Evaluation::Failed(format!(
                    "non-numeric comparison: '{}' between [{}, {}]",
                    output, lo, hi
                )),
            }
        }
        (verify_type, value) => Evaluation::Failed(format!(
            "verify operand {:?} does not fit verify_type '{}'",
            value, verify_type
        )),
    }
}

fn numeric(output: &str, threshold: &str, ok: fn(f64, f64) -> bool, op: &str) -> Evaluation {
    match (as_number(output), as_number(threshold)) {
        (Some(v), Some(t)) => Evaluation::check(ok(v, t), || {
            format!("value {} is not {} {}", output, op, threshold.trim())
        }),
        _ => Evaluation::Failed(format!(
            "non-numeric comparison: '{}' {} '{}'",
            output, op, threshold
        )),
    }
}

fn as_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Map a verdict to a severity through the step's `report_type`
///
/// `execution` never raises severity.
pub fn classify(verdict: Verdict, report_type: ReportType) -> Severity {
    match (verdict, report_type) {
        (Verdict::Passed, _) => Severity::Pass,
        (Verdict::Failed, ReportType::Execution) => Severity::Pass,
        (Verdict::Failed, ReportType::Warning) => Severity::Warning,
        (Verdict::Failed, ReportType::Critical) => Severity::Critical,
    }
}
