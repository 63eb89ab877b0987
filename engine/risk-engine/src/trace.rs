//! Explainability trace: per-factor contributions that reconcile to each target's score.
//!
//! Tracing is opt-in. The engine asks [`TraceCollector::enabled`] before composing any
//! trace data, so [`NoopTraceCollector`] costs nothing beyond that check.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::{clamp01, round4};

pub const TRACE_SCHEMA_VERSION: &str = "1";
pub const CONTRIBUTION_TOLERANCE: f64 = 0.0001;

// ---------------------------------------------------------------------------
// Trace model
// ---------------------------------------------------------------------------

/// Declaration order doubles as the lexicographic order of the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
  Dependency,
  File,
  Module,
  Repository,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorFamily {
  Structural,
  Evolution,
  External,
  Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorId {
  #[serde(rename = "file.structural")]
  FileStructural,
  #[serde(rename = "file.evolution")]
  FileEvolution,
  #[serde(rename = "file.external")]
  FileExternal,
  #[serde(rename = "file.composite.interactions")]
  FileInteractions,
  #[serde(rename = "module.average_file_risk")]
  ModuleAverageFileRisk,
  #[serde(rename = "module.peak_file_risk")]
  ModulePeakFileRisk,
  #[serde(rename = "dependency.signals")]
  DependencySignals,
  #[serde(rename = "dependency.staleness")]
  DependencyStaleness,
  #[serde(rename = "dependency.maintainer_concentration")]
  DependencyMaintainerConcentration,
  #[serde(rename = "dependency.topology")]
  DependencyTopology,
  #[serde(rename = "dependency.bus_factor")]
  DependencyBusFactor,
  #[serde(rename = "dependency.popularity_dampening")]
  DependencyPopularityDampening,
  #[serde(rename = "repository.structural")]
  RepositoryStructural,
  #[serde(rename = "repository.evolution")]
  RepositoryEvolution,
  #[serde(rename = "repository.external")]
  RepositoryExternal,
  #[serde(rename = "repository.composite.interactions")]
  RepositoryInteractions,
}

impl FactorId {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::FileStructural => "file.structural",
      Self::FileEvolution => "file.evolution",
      Self::FileExternal => "file.external",
      Self::FileInteractions => "file.composite.interactions",
      Self::ModuleAverageFileRisk => "module.average_file_risk",
      Self::ModulePeakFileRisk => "module.peak_file_risk",
      Self::DependencySignals => "dependency.signals",
      Self::DependencyStaleness => "dependency.staleness",
      Self::DependencyMaintainerConcentration => "dependency.maintainer_concentration",
      Self::DependencyTopology => "dependency.topology",
      Self::DependencyBusFactor => "dependency.bus_factor",
      Self::DependencyPopularityDampening => "dependency.popularity_dampening",
      Self::RepositoryStructural => "repository.structural",
      Self::RepositoryEvolution => "repository.evolution",
      Self::RepositoryExternal => "repository.external",
      Self::RepositoryInteractions => "repository.composite.interactions",
    }
  }
}

/// Where a factor's evidence lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceRef {
  FileMetric {
    target: String,
    metric: String,
  },
  GraphCycle {
    #[serde(rename = "cycleId")]
    cycle_id: String,
    files: Vec<String>,
  },
  RepositoryMetric {
    metric: String,
  },
  DependencyMetric {
    target: String,
    metric: String,
  },
}

impl EvidenceRef {
  pub fn file_metric(target: &str, metric: &str) -> Self {
    Self::FileMetric {
      target: target.to_string(),
      metric: metric.to_string(),
    }
  }

  pub fn repository_metric(metric: &str) -> Self {
    Self::RepositoryMetric {
      metric: metric.to_string(),
    }
  }

  pub fn dependency_metric(target: &str, metric: &str) -> Self {
    Self::DependencyMetric {
      target: target.to_string(),
      metric: metric.to_string(),
    }
  }
}

/// Named metric values; `None` marks a metric the upstream analyzer did not report.
pub type MetricMap = BTreeMap<String, Option<f64>>;

pub fn metric_map(entries: &[(&str, Option<f64>)]) -> MetricMap {
  entries
    .iter()
    .map(|(name, value)| (name.to_string(), *value))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactorTrace {
  pub factor_id: FactorId,
  pub family: RiskFactorFamily,
  pub contribution: f64,
  pub raw_metrics: MetricMap,
  pub normalized_metrics: MetricMap,
  pub weight: Option<f64>,
  pub amplification: Option<f64>,
  pub evidence: Vec<EvidenceRef>,
  pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReductionLever {
  pub factor_id: FactorId,
  pub estimated_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetTrace {
  pub target_type: TargetType,
  pub target_id: String,
  pub total_score: f64,
  pub normalized_score: f64,
  pub factors: Vec<RiskFactorTrace>,
  pub dominant_factors: Vec<FactorId>,
  pub reduction_levers: Vec<ReductionLever>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTrace {
  pub schema_version: String,
  pub contribution_tolerance: f64,
  pub targets: Vec<TargetTrace>,
}

// ---------------------------------------------------------------------------
// Collectors
// ---------------------------------------------------------------------------

/// Sink for target traces, scoped to a single engine call.
pub trait TraceCollector {
  /// When false the engine skips building trace data entirely.
  fn enabled(&self) -> bool;

  fn record(&mut self, target: TargetTrace);

  /// Consume the collector; `None` for collectors that never record.
  fn into_trace(self) -> Option<RiskTrace>
  where
    Self: Sized;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceCollector;

impl TraceCollector for NoopTraceCollector {
  fn enabled(&self) -> bool {
    false
  }

  fn record(&mut self, _target: TargetTrace) {}

  fn into_trace(self) -> Option<RiskTrace> {
    None
  }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTraceCollector {
  targets: Vec<TargetTrace>,
}

impl TraceCollector for RecordingTraceCollector {
  fn enabled(&self) -> bool {
    true
  }

  fn record(&mut self, target: TargetTrace) {
    self.targets.push(target);
  }

  /// Targets ordered by type, then total score desc, then id.
  fn into_trace(mut self) -> Option<RiskTrace> {
    self.targets.sort_by(|a, b| {
      a.target_type
        .cmp(&b.target_type)
        .then_with(|| {
          b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.target_id.cmp(&b.target_id))
    });

    Some(RiskTrace {
      schema_version: TRACE_SCHEMA_VERSION.to_string(),
      contribution_tolerance: CONTRIBUTION_TOLERANCE,
      targets: self.targets,
    })
  }
}

// ---------------------------------------------------------------------------
// Contribution reconciliation
// ---------------------------------------------------------------------------

/// One factor before its share of the total score is known.
#[derive(Debug, Clone)]
pub struct FactorTraceInput {
  pub factor_id: FactorId,
  pub family: RiskFactorFamily,
  /// Pre-weighting magnitude; only positive strengths receive a contribution.
  pub strength: f64,
  pub raw_metrics: MetricMap,
  pub normalized_metrics: MetricMap,
  pub weight: Option<f64>,
  pub amplification: Option<f64>,
  pub evidence: Vec<EvidenceRef>,
  pub confidence: f64,
}

/// Split `total_score` across factors in proportion to strength.
///
/// Every positive-strength factor gets its rounded share, except the last one in input
/// order which absorbs the remainder, so the contributions sum back to `total_score`.
pub fn build_factor_traces(total_score: f64, inputs: Vec<FactorTraceInput>) -> Vec<RiskFactorTrace> {
  let strength_total: f64 = inputs
    .iter()
    .filter(|input| input.strength > 0.0)
    .map(|input| input.strength)
    .sum();
  let last_positive = inputs.iter().rposition(|input| input.strength > 0.0);
  let distribute = strength_total > 0.0 && total_score > 0.0;

  let mut distributed = 0.0;
  inputs
    .into_iter()
    .enumerate()
    .map(|(index, input)| {
      let contribution = if !distribute || input.strength <= 0.0 {
        0.0
      } else if Some(index) == last_positive {
        round4(total_score - distributed).max(0.0)
      } else {
        round4(total_score * input.strength / strength_total)
      };
      distributed += contribution;

      RiskFactorTrace {
        factor_id: input.factor_id,
        family: input.family,
        contribution,
        raw_metrics: input.raw_metrics,
        normalized_metrics: input.normalized_metrics,
        weight: input.weight,
        amplification: input.amplification,
        evidence: input.evidence,
        confidence: round4(clamp01(input.confidence)),
      }
    })
    .collect()
}

/// Top three positive contributions, largest first, ties by factor id.
fn top_factors(factors: &[RiskFactorTrace]) -> Vec<&RiskFactorTrace> {
  let mut ranked: Vec<&RiskFactorTrace> = factors
    .iter()
    .filter(|factor| factor.contribution > 0.0)
    .collect();
  ranked.sort_by(|a, b| {
    b.contribution
      .partial_cmp(&a.contribution)
      .unwrap_or(Ordering::Equal)
      .then_with(|| a.factor_id.as_str().cmp(b.factor_id.as_str()))
  });
  ranked.truncate(3);
  ranked
}

pub fn build_target_trace(
  target_type: TargetType,
  target_id: &str,
  total_score: f64,
  normalized_score: f64,
  factors: Vec<RiskFactorTrace>,
) -> TargetTrace {
  let top = top_factors(&factors);
  let dominant_factors = top.iter().map(|factor| factor.factor_id).collect();
  let reduction_levers = top
    .iter()
    .map(|factor| ReductionLever {
      factor_id: factor.factor_id,
      estimated_impact: round4(factor.contribution),
    })
    .collect();

  TargetTrace {
    target_type,
    target_id: target_id.to_string(),
    total_score: round4(total_score),
    normalized_score: round4(normalized_score),
    factors,
    dominant_factors,
    reduction_levers,
  }
}
