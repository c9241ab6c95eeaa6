//! Order statistics used by the coherence filter.

use std::cmp::Ordering;

/// Median of `values`, averaging the middle pair for even lengths.
///
/// Returns `None` for an empty slice. Non-finite values sort with
/// [`f64::total_cmp`] and are not filtered out.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Index of the strictly largest finite value; the first index wins ties.
///
/// Values that are not strictly positive are never selected.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            continue;
        }
        match best {
            Some((_, current)) if value.partial_cmp(&current) != Some(Ordering::Greater) => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_and_even_lengths() {
        assert_eq!(median(&[100.0, 102.0, 101.0, 250.0, 99.0]), Some(101.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax_first(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax_first(&[0.0, f64::NAN, 0.0]), None);
    }
}
