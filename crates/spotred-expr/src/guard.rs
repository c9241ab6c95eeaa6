//! Domain guards for numeric primitives.
//!
//! Undefined results never raise: they collapse to [`ERROR_VALUE`], and any
//! primitive fed an [`ERROR_VALUE`] yields [`ERROR_VALUE`] again.

/// Finite sentinel standing in for an undefined numeric result.
pub const ERROR_VALUE: f64 = -9.876_543_210_123_46;

/// Magnitude below which divisors and logarithm arguments are treated as zero.
pub const EPSILON: f64 = 1e-15;

/// Whether `value` is the error sentinel.
pub fn is_error(value: f64) -> bool {
    value == ERROR_VALUE
}

/// Maps non-finite results to the sentinel.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        ERROR_VALUE
    }
}

/// `numerator / denominator`, or the sentinel when the divisor vanishes.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if is_error(numerator) || is_error(denominator) || denominator.abs() < EPSILON {
        return ERROR_VALUE;
    }
    sanitize(numerator / denominator)
}

/// Natural logarithm, or the sentinel for arguments below [`EPSILON`].
pub fn safe_ln(value: f64) -> f64 {
    if is_error(value) || value < EPSILON {
        return ERROR_VALUE;
    }
    sanitize(value.ln())
}

/// Base-10 logarithm, or the sentinel for arguments below [`EPSILON`].
pub fn safe_log10(value: f64) -> f64 {
    if is_error(value) || value < EPSILON {
        return ERROR_VALUE;
    }
    sanitize(value.log10())
}

/// Square root, or the sentinel for negative arguments.
pub fn safe_sqrt(value: f64) -> f64 {
    if is_error(value) || value < 0.0 {
        return ERROR_VALUE;
    }
    sanitize(value.sqrt())
}
