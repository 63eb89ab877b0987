//! Core types for the risk engine (input contracts from upstream analyzers + output
//! summary).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Structural input (dependency graph analyzer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
  pub id: String,
  #[serde(default)]
  pub absolute_path: String,
  #[serde(default)]
  pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphEdge {
  pub from: String,
  pub to: String,
}

/// One strongly connected component reported by the graph analyzer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphCycle {
  pub nodes: Vec<String>,
}

/// Per-file graph position.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDependency {
  pub id: String,
  pub fan_in: u32,
  pub fan_out: u32,
  pub depth: u32,
}

/// Unknown fields are silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAnalysisSummary {
  #[serde(default)]
  pub target_path: String,
  #[serde(default)]
  pub nodes: Vec<GraphNode>,
  #[serde(default)]
  pub edges: Vec<GraphEdge>,
  #[serde(default)]
  pub cycles: Vec<GraphCycle>,
  #[serde(default)]
  pub files: Vec<FileDependency>,
}

// ---------------------------------------------------------------------------
// Evolution input (git history analyzer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEvolutionMetrics {
  pub file_path: String,
  pub commit_count: u32,
  pub churn_total: u64,
  /// Share of this file's commits that landed in the recent window (0..1).
  pub recent_volatility: f64,
  /// Commit share of the file's most active author (0..1).
  pub top_author_share: f64,
  pub bus_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoupling {
  pub file_a: String,
  pub file_b: String,
  pub co_change_commits: u32,
  pub coupling_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CouplingMatrix {
  #[serde(default)]
  pub pairs: Vec<FileCoupling>,
}

/// Git history, or the opaque reason it could not be read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "EvolutionWire")]
pub enum RepositoryEvolutionSummary {
  Available {
    files: Vec<FileEvolutionMetrics>,
    coupling: CouplingMatrix,
  },
  Unavailable {
    reason: String,
  },
}

impl RepositoryEvolutionSummary {
  pub fn is_available(&self) -> bool {
    matches!(self, Self::Available { .. })
  }

  pub fn unavailable(reason: impl Into<String>) -> Self {
    Self::Unavailable {
      reason: reason.into(),
    }
  }
}

/// Wire shape: `{"available": bool, ...}` with the payload present only when available.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvolutionWire {
  available: bool,
  #[serde(default)]
  reason: Option<String>,
  #[serde(default)]
  files: Option<Vec<FileEvolutionMetrics>>,
  #[serde(default)]
  coupling: Option<CouplingMatrix>,
}

impl TryFrom<EvolutionWire> for RepositoryEvolutionSummary {
  type Error = EngineError;

  fn try_from(wire: EvolutionWire) -> Result<Self, Self::Error> {
    if !wire.available {
      return Ok(Self::Unavailable {
        reason: wire.reason.unwrap_or_default(),
      });
    }

    let files = wire
      .files
      .ok_or_else(|| EngineError::validation("evolution.files", "required when available is true"))?;
    Ok(Self::Available {
      files,
      coupling: wire.coupling.unwrap_or_default(),
    })
  }
}

// ---------------------------------------------------------------------------
// External input (dependency health analyzer)
// ---------------------------------------------------------------------------

/// Closed set of risk signals the dependency analyzer may attach to a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRiskSignal {
  SingleMaintainer,
  Abandoned,
  HighCentrality,
  DeepChain,
  HighFanout,
  MetadataUnavailable,
}

impl DependencyRiskSignal {
  pub const ALL: [Self; 6] = [
    Self::SingleMaintainer,
    Self::Abandoned,
    Self::HighCentrality,
    Self::DeepChain,
    Self::HighFanout,
    Self::MetadataUnavailable,
  ];

  /// Share of the signal budget; the weights of `ALL` sum to 1.
  pub fn weight(self) -> f64 {
    match self {
      Self::SingleMaintainer => 0.3,
      Self::Abandoned => 0.3,
      Self::HighCentrality => 0.16,
      Self::DeepChain => 0.14,
      Self::HighFanout => 0.06,
      Self::MetadataUnavailable => 0.04,
    }
  }

  /// Hard signals disable popularity dampening.
  pub fn is_hard(self) -> bool {
    matches!(
      self,
      Self::Abandoned | Self::MetadataUnavailable | Self::SingleMaintainer
    )
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyExposureRecord {
  pub name: String,
  #[serde(default)]
  pub direct: bool,
  #[serde(default)]
  pub own_risk_signals: BTreeSet<DependencyRiskSignal>,
  #[serde(default)]
  pub inherited_risk_signals: BTreeSet<DependencyRiskSignal>,
  #[serde(default)]
  pub maintainer_count: Option<u32>,
  #[serde(default)]
  pub days_since_last_release: Option<f64>,
  #[serde(default)]
  pub weekly_downloads: Option<f64>,
  #[serde(default)]
  pub bus_factor: Option<u32>,
  #[serde(default)]
  pub transitive_dependencies: Vec<String>,
  #[serde(default)]
  pub dependents: u32,
  #[serde(default)]
  pub dependency_depth: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetrics {
  /// Deepest resolved dependency chain in the lockfile.
  #[serde(default)]
  pub dependency_depth: u32,
}

/// Dependency health, or the opaque reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ExternalWire")]
pub enum ExternalAnalysisSummary {
  Available {
    metrics: ExternalMetrics,
    dependencies: Vec<DependencyExposureRecord>,
  },
  Unavailable {
    reason: String,
  },
}

impl ExternalAnalysisSummary {
  pub fn is_available(&self) -> bool {
    matches!(self, Self::Available { .. })
  }

  pub fn unavailable(reason: impl Into<String>) -> Self {
    Self::Unavailable {
      reason: reason.into(),
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExternalWire {
  available: bool,
  #[serde(default)]
  reason: Option<String>,
  #[serde(default)]
  metrics: Option<ExternalMetrics>,
  #[serde(default)]
  dependencies: Option<Vec<DependencyExposureRecord>>,
}

impl TryFrom<ExternalWire> for ExternalAnalysisSummary {
  type Error = EngineError;

  fn try_from(wire: ExternalWire) -> Result<Self, Self::Error> {
    if !wire.available {
      return Ok(Self::Unavailable {
        reason: wire.reason.unwrap_or_default(),
      });
    }

    let dependencies = wire.dependencies.ok_or_else(|| {
      EngineError::validation("external.dependencies", "required when available is true")
    })?;
    Ok(Self::Available {
      metrics: wire.metrics.unwrap_or_default(),
      dependencies,
    })
  }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Per-dimension factors of one file, each in [0,1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
  pub structural: f64,
  pub evolution: f64,
  pub external: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRiskScore {
  pub file: String,
  pub score: f64,
  pub normalized_score: f64,
  pub factors: RiskFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
  pub file: String,
  pub score: f64,
  pub factors: RiskFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRiskScore {
  pub module: String,
  pub score: f64,
  pub normalized_score: f64,
  pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRiskScore {
  pub dependency: String,
  pub score: f64,
  pub normalized_score: f64,
  pub own_risk_signals: BTreeSet<DependencyRiskSignal>,
  pub inherited_risk_signals: BTreeSet<DependencyRiskSignal>,
}

/// Declaration order doubles as the lexicographic order of the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
  ChangeCoupling,
  StructuralCycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragileCluster {
  pub id: String,
  pub kind: ClusterKind,
  pub files: Vec<String>,
  pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyAmplificationZone {
  pub file: String,
  pub score: f64,
  pub external_pressure: f64,
}

/// Everything the engine computed for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRiskSummary {
  pub repository_score: f64,
  pub normalized_score: f64,
  pub hotspots: Vec<Hotspot>,
  pub fragile_clusters: Vec<FragileCluster>,
  pub dependency_amplification_zones: Vec<DependencyAmplificationZone>,
  pub file_scores: Vec<FileRiskScore>,
  pub module_scores: Vec<ModuleRiskScore>,
  pub dependency_scores: Vec<DependencyRiskScore>,
}
