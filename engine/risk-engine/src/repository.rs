//! Repository-wide score from dimension averages and the three interaction terms.

use std::cmp::Ordering;

use crate::config::{DimensionWeights, InteractionWeights};
use crate::file_score::FileRiskContext;
use crate::normalize::saturating_composite;
use crate::stats::{average, clamp01, round4};
use crate::trace::{
  build_factor_traces, build_target_trace, metric_map, EvidenceRef, FactorId, FactorTraceInput,
  RiskFactorFamily, TargetTrace, TargetType,
};
use crate::types::DependencyAmplificationZone;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RepositoryScore {
  pub score: f64,
  pub normalized_score: f64,
  pub structural_dimension: f64,
  pub evolution_dimension: f64,
  pub external_dimension: f64,
  pub critical_instability: f64,
  pub dependency_amplification: f64,
  pub dimension_weights: DimensionWeights,
  pub interaction_weights: InteractionWeights,
}

impl RepositoryScore {
  fn structural_evolution_term(&self) -> f64 {
    self.structural_dimension * self.evolution_dimension * self.interaction_weights.structural_evolution
  }

  fn central_instability_term(&self) -> f64 {
    self.critical_instability * self.interaction_weights.central_instability
  }

  fn dependency_amplification_term(&self) -> f64 {
    self.dependency_amplification * self.interaction_weights.dependency_amplification
  }
}

/// Mean `centrality * evolution` over the top tenth (at least one) of files.
fn critical_instability(files: &[FileRiskContext]) -> f64 {
  let mut ranked: Vec<(f64, &str)> = files
    .iter()
    .map(|file| (file.structural_centrality * file.factors.evolution, file.file.as_str()))
    .collect();
  ranked.sort_by(|a, b| {
    b.0
      .partial_cmp(&a.0)
      .unwrap_or(Ordering::Equal)
      .then_with(|| a.1.cmp(b.1))
  });

  let slice = ((files.len() as f64 * 0.1).ceil() as usize).max(1);
  let products: Vec<f64> = ranked.iter().take(slice).map(|(product, _)| *product).collect();
  average(&products)
}

pub fn compute_repository_score(
  files: &[FileRiskContext],
  zones: &[DependencyAmplificationZone],
  external_pressure: f64,
  dimension_weights: DimensionWeights,
  interaction_weights: InteractionWeights,
) -> RepositoryScore {
  let structural: Vec<f64> = files.iter().map(|file| file.factors.structural).collect();
  let evolution: Vec<f64> = files.iter().map(|file| file.factors.evolution).collect();
  let amplification: Vec<f64> = zones
    .iter()
    .map(|zone| clamp01(zone.external_pressure * zone.score / 100.0))
    .collect();

  let mut repository = RepositoryScore {
    structural_dimension: average(&structural),
    evolution_dimension: average(&evolution),
    external_dimension: external_pressure,
    critical_instability: critical_instability(files),
    dependency_amplification: average(&amplification),
    dimension_weights,
    interaction_weights,
    ..RepositoryScore::default()
  };

  let baseline = repository.structural_dimension * dimension_weights.structural
    + repository.evolution_dimension * dimension_weights.evolution
    + repository.external_dimension * dimension_weights.external;
  let normalized = saturating_composite(
    baseline,
    &[
      repository.structural_evolution_term(),
      repository.central_instability_term(),
      repository.dependency_amplification_term(),
    ],
  );

  repository.score = round4(normalized * 100.0);
  repository.normalized_score = round4(normalized);
  repository
}

pub fn repository_trace(
  target_id: &str,
  repository: &RepositoryScore,
  evolution_available: bool,
  external_available: bool,
) -> TargetTrace {
  let r = repository;
  let dw = r.dimension_weights;
  let structural_evolution = round4(r.structural_evolution_term());
  let central_instability = round4(r.central_instability_term());
  let dependency_amplification = round4(r.dependency_amplification_term());

  let dimension = |factor_id: FactorId,
                   family: RiskFactorFamily,
                   value: f64,
                   weight: f64,
                   metric: &str,
                   confidence: f64| FactorTraceInput {
    factor_id,
    family,
    strength: value * weight,
    raw_metrics: metric_map(&[(metric, Some(round4(value)))]),
    normalized_metrics: metric_map(&[("dimensionWeight", Some(round4(weight)))]),
    weight: Some(weight),
    amplification: None,
    evidence: vec![EvidenceRef::repository_metric(metric)],
    confidence,
  };

  let factors = build_factor_traces(
    r.score,
    vec![
      dimension(
        FactorId::RepositoryStructural,
        RiskFactorFamily::Structural,
        r.structural_dimension,
        dw.structural,
        "structuralDimension",
        1.0,
      ),
      dimension(
        FactorId::RepositoryEvolution,
        RiskFactorFamily::Evolution,
        r.evolution_dimension,
        dw.evolution,
        "evolutionDimension",
        if evolution_available { 1.0 } else { 0.0 },
      ),
      dimension(
        FactorId::RepositoryExternal,
        RiskFactorFamily::External,
        r.external_dimension,
        dw.external,
        "externalDimension",
        if external_available { 0.8 } else { 0.0 },
      ),
      FactorTraceInput {
        factor_id: FactorId::RepositoryInteractions,
        family: RiskFactorFamily::Composite,
        strength: r.structural_evolution_term() + r.central_instability_term() + r.dependency_amplification_term(),
        raw_metrics: metric_map(&[
          ("structuralEvolution", Some(structural_evolution)),
          ("centralInstability", Some(central_instability)),
          ("dependencyAmplification", Some(dependency_amplification)),
        ]),
        normalized_metrics: metric_map(&[
          ("criticalInstability", Some(round4(r.critical_instability))),
          ("dependencyAmplification", Some(round4(r.dependency_amplification))),
        ]),
        weight: None,
        amplification: Some(r.interaction_weights.total()),
        evidence: vec![EvidenceRef::repository_metric("interactionTerms")],
        confidence: 0.9,
      },
    ],
  );

  build_target_trace(TargetType::Repository, target_id, r.score, r.normalized_score, factors)
}
