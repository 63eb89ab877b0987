//! Core engine: runs every scoring stage over one repository snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clusters::{detect_fragile_clusters, FileRiskIndex};
use crate::config::RiskEngineConfig;
use crate::dependency::{compute_dependency_scores, dependency_trace};
use crate::error::EngineError;
use crate::file_score::{compute_file_scores, file_trace, select_hotspots, FileScoringContext};
use crate::modules::{compute_module_scores, module_trace};
use crate::repository::{compute_repository_score, repository_trace};
use crate::trace::{NoopTraceCollector, RecordingTraceCollector, RiskTrace, TraceCollector};
use crate::types::*;
use crate::zones::detect_amplification_zones;

/// Score one repository. Trace data is only built when `collector.enabled()`.
pub fn compute_risk_summary<C: TraceCollector>(
  structural: &GraphAnalysisSummary,
  evolution: &RepositoryEvolutionSummary,
  external: &ExternalAnalysisSummary,
  config: &RiskEngineConfig,
  collector: &mut C,
) -> RepositoryRiskSummary {
  let config = config.sanitized();
  let evolution_available = evolution.is_available();
  let external_available = external.is_available();
  let explain = collector.enabled();

  debug!(
    target_path = %structural.target_path,
    files = structural.files.len(),
    evolution_available,
    external_available,
    explain,
    "computing risk summary"
  );

  let dependencies = compute_dependency_scores(external, &config);
  let dimension_weights = config
    .dimension_weights
    .renormalized(evolution_available, external_available);
  let scoring = FileScoringContext {
    dimension_weights,
    evolution_available,
    external_available,
    external_pressure: dependencies.external_pressure,
  };

  let contexts = compute_file_scores(structural, evolution, scoring, &config);
  let file_scores: Vec<FileRiskScore> = contexts.iter().map(|ctx| ctx.to_score()).collect();
  let hotspots = select_hotspots(&file_scores, &config);
  let modules = compute_module_scores(&file_scores, &config.module);

  let index: FileRiskIndex = file_scores
    .iter()
    .map(|file| (file.file.clone(), file.normalized_score))
    .collect();
  let fragile_clusters = detect_fragile_clusters(&structural.cycles, evolution, &index, &config.coupling_cluster);
  let zones = detect_amplification_zones(&file_scores, external_available, &config.amplification_zone);
  debug!(
    hotspots = hotspots.len(),
    modules = modules.len(),
    clusters = fragile_clusters.len(),
    zones = zones.len(),
    "file-level stages done"
  );

  let repository = compute_repository_score(
    &contexts,
    &zones,
    dependencies.external_pressure,
    dimension_weights,
    config.interaction_weights,
  );

  if explain {
    for ctx in &contexts {
      collector.record(file_trace(ctx, scoring, &config));
    }
    for module in &modules {
      collector.record(module_trace(module));
    }
    for dependency in &dependencies.scored {
      collector.record(dependency_trace(dependency, &config));
    }
    collector.record(repository_trace(
      &structural.target_path,
      &repository,
      evolution_available,
      external_available,
    ));
  }

  debug!(
    repository_score = repository.score,
    normalized_score = repository.normalized_score,
    "risk summary computed"
  );

  RepositoryRiskSummary {
    repository_score: repository.score,
    normalized_score: repository.normalized_score,
    hotspots,
    fragile_clusters,
    dependency_amplification_zones: zones,
    file_scores,
    module_scores: modules.into_iter().map(|module| module.score).collect(),
    dependency_scores: dependencies.scores(),
  }
}

/// Everything one evaluation needs; `config` falls back to the defaults when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvaluationInput {
  pub structural: GraphAnalysisSummary,
  pub evolution: RepositoryEvolutionSummary,
  pub external: ExternalAnalysisSummary,
  #[serde(default)]
  pub config: Option<RiskEngineConfig>,
}

impl RiskEvaluationInput {
  pub fn new(
    structural: GraphAnalysisSummary,
    evolution: RepositoryEvolutionSummary,
    external: ExternalAnalysisSummary,
  ) -> Self {
    Self {
      structural,
      evolution,
      external,
      config: None,
    }
  }

  pub fn with_config(mut self, config: RiskEngineConfig) -> Self {
    self.config = Some(config);
    self
  }

  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let input: Self = serde_json::from_str(raw)?;
    Ok(input)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationOptions {
  pub explain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvaluation {
  pub summary: RepositoryRiskSummary,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub trace: Option<RiskTrace>,
}

pub fn evaluate_repository_risk(input: &RiskEvaluationInput, options: EvaluationOptions) -> RiskEvaluation {
  let default_config;
  let config = match &input.config {
    Some(config) => config,
    None => {
      default_config = RiskEngineConfig::default();
      &default_config
    }
  };

  if options.explain {
    let mut collector = RecordingTraceCollector::default();
    let summary = compute_risk_summary(&input.structural, &input.evolution, &input.external, config, &mut collector);
    RiskEvaluation {
      summary,
      trace: collector.into_trace(),
    }
  } else {
    let mut collector = NoopTraceCollector;
    let summary = compute_risk_summary(&input.structural, &input.evolution, &input.external, config, &mut collector);
    RiskEvaluation {
      summary,
      trace: None,
    }
  }
}

pub fn compute_repository_risk_summary(input: &RiskEvaluationInput) -> RepositoryRiskSummary {
  evaluate_repository_risk(input, EvaluationOptions::default()).summary
}
