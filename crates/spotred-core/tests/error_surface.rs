use spotred_core::errors::{ErrorInfo, ReductionError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("expression", "Age206_238")
        .with_context("reason", "example")
}

#[test]
fn structure_errors_are_fatal() {
    let err = ReductionError::Structure(sample_info("expression-cycle", "cycle detected"));
    assert_eq!(err.info().code, "expression-cycle");
    assert!(err.info().context.contains_key("expression"));
    assert!(err.is_fatal());
}

#[test]
fn evaluation_errors_are_recoverable() {
    let err = ReductionError::Evaluation(sample_info("missing-result", "not evaluated yet"));
    assert_eq!(err.info().code, "missing-result");
    assert!(!err.is_fatal());
}

#[test]
fn statistics_error_surface() {
    let err = ReductionError::Statistics(sample_info("coherence-aborted", "loop aborted"));
    assert!(err.info().context.contains_key("reason"));
    assert!(!err.is_fatal());
}

#[test]
fn display_includes_context_and_hint() {
    let err = ReductionError::Parameter(
        ErrorInfo::new("unknown-value", "value is not part of the model")
            .with_context("value", "lambda999")
            .with_hint("check the model name"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("parameter error: value is not part of the model"));
    assert!(rendered.contains("value=lambda999"));
    assert!(rendered.contains("hint: check the model name"));
}
