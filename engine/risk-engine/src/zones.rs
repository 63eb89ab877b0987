//! Files where third-party exposure meets structural or change-history risk.

use crate::config::AmplificationZoneConfig;
use crate::stats::{by_score_desc_then_id, clamp01, percentile, round4};
use crate::types::{DependencyAmplificationZone, FileRiskScore};

pub fn detect_amplification_zones(
  file_scores: &[FileRiskScore],
  external_available: bool,
  config: &AmplificationZoneConfig,
) -> Vec<DependencyAmplificationZone> {
  if !external_available {
    return Vec::new();
  }

  let externals: Vec<f64> = file_scores.iter().map(|file| file.factors.external).collect();
  let threshold = config
    .pressure_floor
    .max(percentile(&externals, config.percentile_threshold));

  let mut zones: Vec<DependencyAmplificationZone> = file_scores
    .iter()
    .filter(|file| file.factors.external >= threshold)
    .map(|file| {
      let factors = file.factors;
      let intensity = clamp01(factors.external * factors.structural.max(factors.evolution));
      let score = clamp01(intensity * 0.7 + file.normalized_score * 0.3);

      DependencyAmplificationZone {
        file: file.file.clone(),
        score: round4(score * 100.0),
        external_pressure: round4(factors.external),
      }
    })
    .collect();

  zones.sort_by(|a, b| by_score_desc_then_id(a.score, &a.file, b.score, &b.file));
  zones.truncate(config.max_zones);
  zones
}
