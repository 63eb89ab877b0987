//! Engine configuration with sane defaults.
//!
//! Every sub-table is `#[serde(default)]`, so a partial JSON override only replaces the
//! keys it names and everything else keeps its default.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::normalize::normalize_weights;
use crate::stats::clamp01;

/// Base influence of each risk dimension before renormalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DimensionWeights {
  pub structural: f64,
  pub evolution: f64,
  pub external: f64,
}

impl DimensionWeights {
  /// Weights renormalized over the dimensions that have data; structural always does.
  pub fn renormalized(&self, evolution_available: bool, external_available: bool) -> Self {
    let [structural, evolution, external] = normalize_weights(
      [self.structural, self.evolution, self.external],
      [true, evolution_available, external_available],
    );
    Self {
      structural,
      evolution,
      external,
    }
  }
}

impl Default for DimensionWeights {
  fn default() -> Self {
    Self {
      structural: 0.44,
      evolution: 0.36,
      external: 0.2,
    }
  }
}

/// Interaction terms only activate when both related dimensions are high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionWeights {
  pub structural_evolution: f64,
  pub central_instability: f64,
  pub dependency_amplification: f64,
}

impl InteractionWeights {
  pub fn total(&self) -> f64 {
    self.structural_evolution + self.central_instability + self.dependency_amplification
  }
}

impl Default for InteractionWeights {
  fn default() -> Self {
    Self {
      structural_evolution: 0.35,
      central_instability: 0.25,
      dependency_amplification: 0.2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuralFactorWeights {
  pub fan_in: f64,
  pub fan_out: f64,
  pub depth: f64,
  pub cycle_participation: f64,
}

impl Default for StructuralFactorWeights {
  fn default() -> Self {
    Self {
      fan_in: 0.3,
      fan_out: 0.25,
      depth: 0.2,
      cycle_participation: 0.25,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvolutionFactorWeights {
  pub frequency: f64,
  pub churn: f64,
  pub recent_volatility: f64,
  pub ownership_concentration: f64,
  pub bus_factor_risk: f64,
}

impl Default for EvolutionFactorWeights {
  fn default() -> Self {
    Self {
      frequency: 0.26,
      churn: 0.24,
      recent_volatility: 0.2,
      ownership_concentration: 0.18,
      bus_factor_risk: 0.12,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DependencyFactorWeights {
  pub signals: f64,
  pub staleness: f64,
  pub maintainer_concentration: f64,
  pub transitive_burden: f64,
  pub centrality: f64,
  pub chain_depth: f64,
  pub bus_factor_risk: f64,
}

impl Default for DependencyFactorWeights {
  fn default() -> Self {
    Self {
      signals: 0.38,
      staleness: 0.16,
      maintainer_concentration: 0.16,
      transitive_burden: 0.1,
      centrality: 0.08,
      chain_depth: 0.06,
      bus_factor_risk: 0.06,
    }
  }
}

/// Percentiles used as an outlier-robust min/max surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantileClamp {
  pub lower: f64,
  pub upper: f64,
}

impl Default for QuantileClamp {
  fn default() -> Self {
    Self {
      lower: 0.05,
      upper: 0.95,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CouplingClusterConfig {
  /// Pairs that co-changed fewer times than this are ignored.
  pub min_co_change_commits: u32,
  pub percentile_threshold: f64,
  /// Lowest coupling score a pair may have to join a cluster.
  pub floor_score: f64,
}

impl Default for CouplingClusterConfig {
  fn default() -> Self {
    Self {
      min_co_change_commits: 2,
      percentile_threshold: 0.9,
      floor_score: 0.35,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmplificationZoneConfig {
  pub pressure_floor: f64,
  pub percentile_threshold: f64,
  pub max_zones: usize,
}

impl Default for AmplificationZoneConfig {
  fn default() -> Self {
    Self {
      pressure_floor: 0.2,
      percentile_threshold: 0.85,
      max_zones: 20,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
  pub max_prefix_segments: usize,
  pub root_label: String,
  pub common_source_roots: Vec<String>,
}

impl Default for ModuleConfig {
  fn default() -> Self {
    Self {
      max_prefix_segments: 2,
      root_label: "(root)".to_string(),
      common_source_roots: ["src", "lib", "app", "packages"]
        .iter()
        .map(|root| root.to_string())
        .collect(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DependencySignalConfig {
  pub inherited_signal_multiplier: f64,
  /// At this age (days), staleness reaches 50% risk.
  pub abandoned_half_life_days: f64,
  /// Risk assumed for a metric the registry did not report.
  pub missing_metadata_penalty: f64,
  /// At this download volume, popularity reaches 50% of its dampening effect.
  pub popularity_half_life_downloads: f64,
  /// Popularity can only reduce dependency risk by this fraction.
  pub popularity_max_dampening: f64,
}

impl Default for DependencySignalConfig {
  fn default() -> Self {
    Self {
      inherited_signal_multiplier: 0.45,
      abandoned_half_life_days: 540.0,
      missing_metadata_penalty: 0.5,
      popularity_half_life_downloads: 100_000.0,
      popularity_max_dampening: 0.12,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalDimensionConfig {
  pub top_dependency_percentile: f64,
  pub dependency_depth_half_life: f64,
}

impl Default for ExternalDimensionConfig {
  fn default() -> Self {
    Self {
      top_dependency_percentile: 0.85,
      dependency_depth_half_life: 6.0,
    }
  }
}

/// Tunable weights and thresholds for the risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskEngineConfig {
  pub dimension_weights: DimensionWeights,
  pub interaction_weights: InteractionWeights,
  pub structural_factor_weights: StructuralFactorWeights,
  pub evolution_factor_weights: EvolutionFactorWeights,
  pub dependency_factor_weights: DependencyFactorWeights,
  pub quantile_clamp: QuantileClamp,
  /// Fraction of files reported as hotspots, bounded by the min/max below.
  pub hotspot_top_percent: f64,
  pub hotspot_min_files: usize,
  pub hotspot_max_files: usize,
  pub coupling_cluster: CouplingClusterConfig,
  pub amplification_zone: AmplificationZoneConfig,
  pub module: ModuleConfig,
  pub dependency_signals: DependencySignalConfig,
  pub external_dimension: ExternalDimensionConfig,
}

impl Default for RiskEngineConfig {
  fn default() -> Self {
    Self {
      dimension_weights: DimensionWeights::default(),
      interaction_weights: InteractionWeights::default(),
      structural_factor_weights: StructuralFactorWeights::default(),
      evolution_factor_weights: EvolutionFactorWeights::default(),
      dependency_factor_weights: DependencyFactorWeights::default(),
      quantile_clamp: QuantileClamp::default(),
      hotspot_top_percent: 0.12,
      hotspot_min_files: 3,
      hotspot_max_files: 30,
      coupling_cluster: CouplingClusterConfig::default(),
      amplification_zone: AmplificationZoneConfig::default(),
      module: ModuleConfig::default(),
      dependency_signals: DependencySignalConfig::default(),
      external_dimension: ExternalDimensionConfig::default(),
    }
  }
}

/// Weights and half-lives are never negative; NaN and infinities collapse to zero.
fn non_negative(value: f64) -> f64 {
  if value.is_finite() {
    value.max(0.0)
  } else {
    0.0
  }
}

impl RiskEngineConfig {
  /// Parse a (possibly partial) JSON override; missing keys keep their defaults.
  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let config: Self = serde_json::from_str(raw)?;
    Ok(config)
  }

  /// Copy with every weight clamped to >= 0 and every fraction clamped to [0,1].
  ///
  /// The engine always scores with a sanitized config, so a malformed override degrades
  /// to zero influence instead of producing negative or NaN scores.
  pub fn sanitized(&self) -> Self {
    let d = self.dimension_weights;
    let i = self.interaction_weights;
    let s = self.structural_factor_weights;
    let e = self.evolution_factor_weights;
    let f = self.dependency_factor_weights;
    let sig = self.dependency_signals;

    Self {
      dimension_weights: DimensionWeights {
        structural: non_negative(d.structural),
        evolution: non_negative(d.evolution),
        external: non_negative(d.external),
      },
      interaction_weights: InteractionWeights {
        structural_evolution: non_negative(i.structural_evolution),
        central_instability: non_negative(i.central_instability),
        dependency_amplification: non_negative(i.dependency_amplification),
      },
      structural_factor_weights: StructuralFactorWeights {
        fan_in: non_negative(s.fan_in),
        fan_out: non_negative(s.fan_out),
        depth: non_negative(s.depth),
        cycle_participation: non_negative(s.cycle_participation),
      },
      evolution_factor_weights: EvolutionFactorWeights {
        frequency: non_negative(e.frequency),
        churn: non_negative(e.churn),
        recent_volatility: non_negative(e.recent_volatility),
        ownership_concentration: non_negative(e.ownership_concentration),
        bus_factor_risk: non_negative(e.bus_factor_risk),
      },
      dependency_factor_weights: DependencyFactorWeights {
        signals: non_negative(f.signals),
        staleness: non_negative(f.staleness),
        maintainer_concentration: non_negative(f.maintainer_concentration),
        transitive_burden: non_negative(f.transitive_burden),
        centrality: non_negative(f.centrality),
        chain_depth: non_negative(f.chain_depth),
        bus_factor_risk: non_negative(f.bus_factor_risk),
      },
      quantile_clamp: QuantileClamp {
        lower: clamp01(self.quantile_clamp.lower),
        upper: clamp01(self.quantile_clamp.upper),
      },
      hotspot_top_percent: clamp01(self.hotspot_top_percent),
      hotspot_min_files: self.hotspot_min_files,
      hotspot_max_files: self.hotspot_max_files,
      coupling_cluster: CouplingClusterConfig {
        min_co_change_commits: self.coupling_cluster.min_co_change_commits,
        percentile_threshold: clamp01(self.coupling_cluster.percentile_threshold),
        floor_score: non_negative(self.coupling_cluster.floor_score),
      },
      amplification_zone: AmplificationZoneConfig {
        pressure_floor: non_negative(self.amplification_zone.pressure_floor),
        percentile_threshold: clamp01(self.amplification_zone.percentile_threshold),
        max_zones: self.amplification_zone.max_zones,
      },
      module: self.module.clone(),
      dependency_signals: DependencySignalConfig {
        inherited_signal_multiplier: non_negative(sig.inherited_signal_multiplier),
        abandoned_half_life_days: non_negative(sig.abandoned_half_life_days),
        missing_metadata_penalty: clamp01(sig.missing_metadata_penalty),
        popularity_half_life_downloads: non_negative(sig.popularity_half_life_downloads),
        popularity_max_dampening: clamp01(sig.popularity_max_dampening),
      },
      external_dimension: ExternalDimensionConfig {
        top_dependency_percentile: clamp01(self.external_dimension.top_dependency_percentile),
        dependency_depth_half_life: non_negative(self.external_dimension.dependency_depth_half_life),
      },
    }
  }
}
