//! Order statistics and rounding shared by every scorer.

use std::cmp::Ordering;

/// Clamp into [0,1]; non-finite input maps to 0.
pub fn clamp01(value: f64) -> f64 {
  if value.is_finite() {
    value.clamp(0.0, 1.0)
  } else {
    0.0
  }
}

/// Round to 4 decimal places (half away from zero).
pub fn round4(value: f64) -> f64 {
  (value * 10_000.0).round() / 10_000.0
}

pub fn average(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation between the order statistics surrounding `p * (n - 1)`.
///
/// Empty input yields 0 and a singleton yields its only value, whatever `p` is.
pub fn percentile(values: &[f64], p: f64) -> f64 {
  match values {
    [] => 0.0,
    [only] => *only,
    _ => {
      let mut sorted = values.to_vec();
      sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

      let position = clamp01(p) * (sorted.len() - 1) as f64;
      let lower_index = position.floor() as usize;
      let upper_index = position.ceil() as usize;
      let lower = sorted[lower_index];
      let upper = sorted[upper_index];

      if lower_index == upper_index {
        return lower;
      }

      lower + (upper - lower) * (position - lower_index as f64)
    }
  }
}

/// Descending by score, ascending by id. Every ranked list in the output uses this.
pub fn by_score_desc_then_id(a_score: f64, a_id: &str, b_score: f64, b_id: &str) -> Ordering {
  b_score
    .partial_cmp(&a_score)
    .unwrap_or(Ordering::Equal)
    .then_with(|| a_id.cmp(b_id))
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn clamp01_handles_non_finite() {
    assert_eq!(clamp01(f64::NAN), 0.0);
    assert_eq!(clamp01(f64::INFINITY), 0.0);
    assert_eq!(clamp01(-0.3), 0.0);
    assert_eq!(clamp01(1.7), 1.0);
    assert_eq!(clamp01(0.42), 0.42);
  }

  #[test]
  fn round4_keeps_four_decimals() {
    assert_eq!(round4(0.123456), 0.1235);
    assert_eq!(round4(12.34564), 12.3456);
    assert_eq!(round4(40.0), 40.0);
  }

  #[test]
  fn average_of_empty_is_zero() {
    assert_eq!(average(&[]), 0.0);
    assert_eq!(average(&[1.0, 2.0, 3.0]), 2.0);
  }

  #[test]
  fn percentile_boundaries() {
    assert_eq!(percentile(&[], 0.9), 0.0);
    assert_eq!(percentile(&[7.5], 0.1), 7.5);
    assert_eq!(percentile(&[7.5], 0.9), 7.5);
  }

  #[test]
  fn percentile_interpolates_unsorted_input() {
    let values = [0.72, 0.2];
    assert!((percentile(&values, 0.9) - 0.668).abs() < 1e-12);
    assert_eq!(percentile(&[3.0, 1.0, 2.0], 0.5), 2.0);
    assert_eq!(percentile(&[3.0, 1.0, 2.0], 0.0), 1.0);
    assert_eq!(percentile(&[3.0, 1.0, 2.0], 1.0), 3.0);
  }

  #[test]
  fn percentile_clamps_p() {
    assert_eq!(percentile(&[1.0, 5.0], -2.0), 1.0);
    assert_eq!(percentile(&[1.0, 5.0], 4.0), 5.0);
  }

  #[test]
  fn ties_break_by_id() {
    assert_eq!(by_score_desc_then_id(1.0, "b", 1.0, "a"), Ordering::Greater);
    assert_eq!(by_score_desc_then_id(2.0, "z", 1.0, "a"), Ordering::Less);
  }

  proptest! {
    #[test]
    fn percentile_stays_within_range(
      values in prop::collection::vec(-1000.0..1000.0f64, 1..40),
      p in 0.0..1.0f64,
    ) {
      let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
      let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
      let value = percentile(&values, p);
      prop_assert!(value >= min - 1e-9 && value <= max + 1e-9);
    }

    #[test]
    fn percentile_is_monotone_in_p(
      values in prop::collection::vec(0.0..100.0f64, 2..30),
      a in 0.0..1.0f64,
      b in 0.0..1.0f64,
    ) {
      let (low, high) = if a <= b { (a, b) } else { (b, a) };
      prop_assert!(percentile(&values, low) <= percentile(&values, high) + 1e-9);
    }
  }
}
