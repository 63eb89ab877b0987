//! Normalization primitives: put heterogeneous, heavy-tailed metrics onto [0,1] and fold
//! them together without ever leaving that range.

use serde::{Deserialize, Serialize};

use crate::stats::{clamp01, percentile};

/// Upstream collaborators may report Windows separators.
pub fn normalize_path(path: &str) -> String {
  path.replace('\\', "/")
}

/// `ln(1 + max(0, x))`; compresses counts such as fan-in or downloads.
pub fn log_scale(value: f64) -> f64 {
  value.max(0.0).ln_1p()
}

/// Outlier-robust min/max surrogate built from two percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileScale {
  pub lower: f64,
  pub upper: f64,
}

pub fn build_quantile_scale(values: &[f64], lower_percentile: f64, upper_percentile: f64) -> QuantileScale {
  if values.is_empty() {
    return QuantileScale {
      lower: 0.0,
      upper: 0.0,
    };
  }

  QuantileScale {
    lower: percentile(values, lower_percentile),
    upper: percentile(values, upper_percentile),
  }
}

/// Position of `value` inside `scale`; a degenerate scale falls back to "any signal at all".
pub fn normalize_with_scale(value: f64, scale: QuantileScale) -> f64 {
  if scale.upper <= scale.lower {
    return if value > 0.0 { 1.0 } else { 0.0 };
  }
  clamp01((value - scale.lower) / (scale.upper - scale.lower))
}

/// Saturating curve `v / (v + h)`: 0.5 exactly at `v == h`, 0 for non-positive input.
pub fn half_life_risk(value: f64, half_life: f64) -> f64 {
  if value <= 0.0 || half_life <= 0.0 {
    return 0.0;
  }
  clamp01(value / (value + half_life))
}

/// Fold amplification terms in order onto a baseline; each closes part of the remaining gap to 1.
pub fn saturating_composite(baseline: f64, amplifications: &[f64]) -> f64 {
  let value = amplifications
    .iter()
    .fold(clamp01(baseline), |value, amplification| {
      value + (1.0 - value) * clamp01(*amplification)
    });
  clamp01(value)
}

/// Zero disabled entries, clamp the rest to >= 0 and rescale them to sum to 1.
///
/// When every enabled weight is zero the enabled entries share the mass uniformly; with
/// nothing enabled the result is all zeros.
pub fn normalize_weights<const N: usize>(weights: [f64; N], enabled: [bool; N]) -> [f64; N] {
  let mut result = [0.0; N];
  for (index, weight) in weights.iter().enumerate() {
    if enabled[index] {
      result[index] = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
    }
  }

  let total: f64 = result.iter().sum();
  if total > 0.0 {
    for value in result.iter_mut() {
      *value /= total;
    }
    return result;
  }

  let active = enabled.iter().filter(|flag| **flag).count();
  if active == 0 {
    return result;
  }

  let uniform = 1.0 / active as f64;
  for (index, value) in result.iter_mut().enumerate() {
    if enabled[index] {
      *value = uniform;
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn path_separators_are_normalized() {
    assert_eq!(normalize_path("src\\app\\x.ts"), "src/app/x.ts");
    assert_eq!(normalize_path("src/app/x.ts"), "src/app/x.ts");
  }

  #[test]
  fn log_scale_ignores_negatives() {
    assert_eq!(log_scale(-5.0), 0.0);
    assert_eq!(log_scale(0.0), 0.0);
    assert!((log_scale(1.0) - std::f64::consts::LN_2).abs() < 1e-12);
  }

  #[test]
  fn empty_scale_is_degenerate() {
    let scale = build_quantile_scale(&[], 0.05, 0.95);
    assert_eq!(scale, QuantileScale { lower: 0.0, upper: 0.0 });
    assert_eq!(normalize_with_scale(3.0, scale), 1.0);
    assert_eq!(normalize_with_scale(0.0, scale), 0.0);
  }

  #[test]
  fn scale_positions_value() {
    let scale = QuantileScale {
      lower: 2.0,
      upper: 4.0,
    };
    assert_eq!(normalize_with_scale(3.0, scale), 0.5);
    assert_eq!(normalize_with_scale(1.0, scale), 0.0);
    assert_eq!(normalize_with_scale(9.0, scale), 1.0);
  }

  #[test]
  fn half_life_is_half_at_half_life() {
    assert_eq!(half_life_risk(540.0, 540.0), 0.5);
    assert_eq!(half_life_risk(6.0, 6.0), 0.5);
    assert_eq!(half_life_risk(0.0, 6.0), 0.0);
    assert_eq!(half_life_risk(10.0, 0.0), 0.0);
  }

  #[test]
  fn saturating_composite_closes_gap() {
    assert_eq!(saturating_composite(0.5, &[]), 0.5);
    assert_eq!(saturating_composite(0.5, &[0.5]), 0.75);
    assert_eq!(saturating_composite(0.5, &[0.5, 0.5]), 0.875);
    assert_eq!(saturating_composite(0.2, &[1.0, 0.3]), 1.0);
    assert_eq!(saturating_composite(-1.0, &[-3.0]), 0.0);
  }

  #[test]
  fn weights_renormalize_over_enabled() {
    let weights = normalize_weights([0.44, 0.36, 0.2], [true, false, false]);
    assert_eq!(weights, [1.0, 0.0, 0.0]);

    let weights = normalize_weights([0.44, 0.36, 0.2], [true, true, true]);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
  }

  #[test]
  fn negative_weights_are_clamped() {
    let weights = normalize_weights([-1.0, 1.0, 1.0], [true, true, true]);
    assert_eq!(weights, [0.0, 0.5, 0.5]);
  }

  #[test]
  fn zero_weights_fall_back_to_uniform() {
    let weights = normalize_weights([0.0, 0.0, 0.9], [true, true, false]);
    assert_eq!(weights, [0.5, 0.5, 0.0]);
    assert_eq!(normalize_weights([0.3, 0.7], [false, false]), [0.0, 0.0]);
  }

  proptest! {
    #[test]
    fn composite_never_exceeds_one(
      baseline in -2.0..2.0f64,
      amplifications in prop::collection::vec(-2.0..2.0f64, 0..12),
    ) {
      let value = saturating_composite(baseline, &amplifications);
      prop_assert!((0.0..=1.0).contains(&value));
      prop_assert!(value >= clamp01(baseline) - 1e-12);
    }

    #[test]
    fn half_life_is_monotone(a in 0.0..1e7f64, b in 0.0..1e7f64, h in 1.0..1e6f64) {
      let (low, high) = if a <= b { (a, b) } else { (b, a) };
      prop_assert!(half_life_risk(low, h) <= half_life_risk(high, h));
      prop_assert!(half_life_risk(high, h) < 1.0);
    }

    #[test]
    fn scaled_values_are_unit(value in -100.0..100.0f64, lower in -10.0..10.0f64, width in 0.0..50.0f64) {
      let scale = QuantileScale { lower, upper: lower + width };
      prop_assert!((0.0..=1.0).contains(&normalize_with_scale(value, scale)));
    }
  }
}
