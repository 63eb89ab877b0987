//! Direct-dependency risk: health signals, staleness, maintainer concentration and
//! topology, dampened for popular packages, rolled up into repository external pressure.
//!
//! Topology sub-metrics are scaled against the dependencies of the current run only, so a
//! small project's "most central" package is central relative to its siblings, not to the
//! registry.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::RiskEngineConfig;
use crate::normalize::{build_quantile_scale, half_life_risk, log_scale, normalize_with_scale};
use crate::stats::{average, by_score_desc_then_id, clamp01, percentile, round4};
use crate::trace::{
  build_factor_traces, build_target_trace, metric_map, EvidenceRef, FactorId, FactorTraceInput,
  RiskFactorFamily, TargetTrace, TargetType,
};
use crate::types::{
  DependencyExposureRecord, DependencyRiskScore, DependencyRiskSignal, ExternalAnalysisSummary,
};

/// Metrics as reported upstream, kept for the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDependencyMetrics {
  pub days_since_last_release: Option<f64>,
  pub maintainer_count: Option<u32>,
  pub transitive_count: usize,
  pub dependents: u32,
  pub dependency_depth: u32,
  pub bus_factor: Option<u32>,
  pub weekly_downloads: Option<f64>,
}

/// Rounded intermediate risks behind one dependency score.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyContext {
  pub signal_score: f64,
  pub staleness_risk: f64,
  pub maintainer_concentration_risk: f64,
  pub transitive_burden_risk: f64,
  pub centrality_risk: f64,
  pub chain_depth_risk: f64,
  pub bus_factor_risk: f64,
  pub popularity_dampener: f64,
  pub raw: RawDependencyMetrics,
  pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDependency {
  pub score: DependencyRiskScore,
  pub context: DependencyContext,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DependencyScoreComputation {
  /// Sorted by normalized score desc, then name.
  pub scored: Vec<ScoredDependency>,
  pub external_pressure: f64,
}

impl DependencyScoreComputation {
  pub fn scores(&self) -> Vec<DependencyRiskScore> {
    self.scored.iter().map(|scored| scored.score.clone()).collect()
  }
}

fn signal_weight(signals: &BTreeSet<DependencyRiskSignal>) -> f64 {
  signals.iter().map(|signal| signal.weight()).sum()
}

/// Own signals count fully, inherited ones at `inherited_multiplier`, against the budget
/// a package carrying every signal both ways would reach.
pub fn signal_score(
  own: &BTreeSet<DependencyRiskSignal>,
  inherited: &BTreeSet<DependencyRiskSignal>,
  inherited_multiplier: f64,
) -> f64 {
  let budget: f64 = DependencyRiskSignal::ALL.iter().map(|signal| signal.weight()).sum();
  let max_weighted_total = budget * (1.0 + inherited_multiplier);
  if max_weighted_total <= 0.0 {
    return 0.0;
  }

  let weighted_total = signal_weight(own) + signal_weight(inherited) * inherited_multiplier;
  clamp01(weighted_total / max_weighted_total)
}

/// `1 / max(1, count)`, or the missing-metadata penalty when unknown.
fn inverse_count_risk(count: Option<u32>, missing_penalty: f64) -> f64 {
  match count {
    Some(count) => clamp01(1.0 / f64::from(count.max(1))),
    None => missing_penalty,
  }
}

pub fn compute_dependency_scores(
  external: &ExternalAnalysisSummary,
  config: &RiskEngineConfig,
) -> DependencyScoreComputation {
  let (metrics, dependencies) = match external {
    ExternalAnalysisSummary::Available {
      metrics,
      dependencies,
    } => (metrics, dependencies),
    ExternalAnalysisSummary::Unavailable { .. } => return DependencyScoreComputation::default(),
  };

  let direct: Vec<&DependencyExposureRecord> = dependencies.iter().filter(|dep| dep.direct).collect();
  let clamp = config.quantile_clamp;

  let transitive_scale = build_quantile_scale(
    &direct
      .iter()
      .map(|dep| log_scale(dep.transitive_dependencies.len() as f64))
      .collect::<Vec<_>>(),
    clamp.lower,
    clamp.upper,
  );
  let dependent_scale = build_quantile_scale(
    &direct
      .iter()
      .map(|dep| log_scale(f64::from(dep.dependents)))
      .collect::<Vec<_>>(),
    clamp.lower,
    clamp.upper,
  );
  let chain_depth_scale = build_quantile_scale(
    &direct
      .iter()
      .map(|dep| f64::from(dep.dependency_depth))
      .collect::<Vec<_>>(),
    clamp.lower,
    clamp.upper,
  );

  let signals = config.dependency_signals;
  let weights = config.dependency_factor_weights;

  let mut scored: Vec<ScoredDependency> = direct
    .iter()
    .map(|dep| {
      let signal_score = signal_score(
        &dep.own_risk_signals,
        &dep.inherited_risk_signals,
        signals.inherited_signal_multiplier,
      );
      let maintainer_concentration_risk =
        inverse_count_risk(dep.maintainer_count, signals.missing_metadata_penalty);
      let staleness_risk = match dep.days_since_last_release {
        Some(days) => half_life_risk(days, signals.abandoned_half_life_days),
        None => signals.missing_metadata_penalty,
      };
      let transitive_burden_risk = normalize_with_scale(
        log_scale(dep.transitive_dependencies.len() as f64),
        transitive_scale,
      );
      let centrality_risk = normalize_with_scale(log_scale(f64::from(dep.dependents)), dependent_scale);
      let chain_depth_risk = normalize_with_scale(f64::from(dep.dependency_depth), chain_depth_scale);
      let bus_factor_risk = inverse_count_risk(dep.bus_factor, signals.missing_metadata_penalty);

      let base_score = clamp01(
        signal_score * weights.signals
          + staleness_risk * weights.staleness
          + maintainer_concentration_risk * weights.maintainer_concentration
          + transitive_burden_risk * weights.transitive_burden
          + centrality_risk * weights.centrality
          + chain_depth_risk * weights.chain_depth
          + bus_factor_risk * weights.bus_factor_risk,
      );

      // A popular package only earns leniency when nothing hard is wrong with it.
      let has_hard_signal = dep.own_risk_signals.iter().any(|signal| signal.is_hard());
      let popularity_dampener = match dep.weekly_downloads {
        Some(downloads) if !has_hard_signal => {
          1.0
            - half_life_risk(downloads, signals.popularity_half_life_downloads)
              * signals.popularity_max_dampening
        }
        _ => 1.0,
      };
      let normalized_score = clamp01(base_score * popularity_dampener);

      let available_metric_count = [
        dep.days_since_last_release.is_some(),
        dep.maintainer_count.is_some(),
        dep.bus_factor.is_some(),
        dep.weekly_downloads.is_some(),
      ]
      .iter()
      .filter(|known| **known)
      .count();
      let confidence = clamp01(0.5 + available_metric_count as f64 * 0.125);

      ScoredDependency {
        score: DependencyRiskScore {
          dependency: dep.name.clone(),
          score: round4(normalized_score * 100.0),
          normalized_score: round4(normalized_score),
          own_risk_signals: dep.own_risk_signals.clone(),
          inherited_risk_signals: dep.inherited_risk_signals.clone(),
        },
        context: DependencyContext {
          signal_score: round4(signal_score),
          staleness_risk: round4(staleness_risk),
          maintainer_concentration_risk: round4(maintainer_concentration_risk),
          transitive_burden_risk: round4(transitive_burden_risk),
          centrality_risk: round4(centrality_risk),
          chain_depth_risk: round4(chain_depth_risk),
          bus_factor_risk: round4(bus_factor_risk),
          popularity_dampener: round4(popularity_dampener),
          raw: RawDependencyMetrics {
            days_since_last_release: dep.days_since_last_release,
            maintainer_count: dep.maintainer_count,
            transitive_count: dep.transitive_dependencies.len(),
            dependents: dep.dependents,
            dependency_depth: dep.dependency_depth,
            bus_factor: dep.bus_factor,
            weekly_downloads: dep.weekly_downloads,
          },
          confidence: round4(confidence),
        },
      }
    })
    .collect();

  scored.sort_by(|a, b| {
    by_score_desc_then_id(
      a.score.normalized_score,
      &a.score.dependency,
      b.score.normalized_score,
      &b.score.dependency,
    )
  });

  let normalized: Vec<f64> = scored.iter().map(|dep| dep.score.normalized_score).collect();
  let high_dependency_risk = if normalized.is_empty() {
    0.0
  } else {
    percentile(&normalized, config.external_dimension.top_dependency_percentile)
  };
  let depth_risk = half_life_risk(
    f64::from(metrics.dependency_depth),
    config.external_dimension.dependency_depth_half_life,
  );
  let external_pressure =
    round4(clamp01(high_dependency_risk * 0.5 + average(&normalized) * 0.3 + depth_risk * 0.2));

  debug!(
    dependencies = scored.len(),
    ignored_transitive = dependencies.len() - direct.len(),
    external_pressure,
    "dependency scores computed"
  );

  DependencyScoreComputation {
    scored,
    external_pressure,
  }
}

fn opt_count(value: Option<u32>) -> Option<f64> {
  value.map(f64::from)
}

pub fn dependency_trace(dependency: &ScoredDependency, config: &RiskEngineConfig) -> TargetTrace {
  let name = dependency.score.dependency.as_str();
  let ctx = &dependency.context;
  let raw = &ctx.raw;
  let weights = config.dependency_factor_weights;
  let has_metadata = raw.days_since_last_release.is_some() && raw.maintainer_count.is_some();
  let metadata_confidence = if has_metadata { 0.9 } else { 0.5 };

  let factors = build_factor_traces(
    dependency.score.score,
    vec![
      FactorTraceInput {
        factor_id: FactorId::DependencySignals,
        family: RiskFactorFamily::External,
        strength: ctx.signal_score * weights.signals,
        raw_metrics: metric_map(&[
          ("ownSignals", Some(dependency.score.own_risk_signals.len() as f64)),
          ("inheritedSignals", Some(dependency.score.inherited_risk_signals.len() as f64)),
        ]),
        normalized_metrics: metric_map(&[("signalScore", Some(ctx.signal_score))]),
        weight: Some(weights.signals),
        amplification: Some(config.dependency_signals.inherited_signal_multiplier),
        evidence: vec![EvidenceRef::dependency_metric(name, "riskSignals")],
        confidence: 0.95,
      },
      FactorTraceInput {
        factor_id: FactorId::DependencyStaleness,
        family: RiskFactorFamily::External,
        strength: ctx.staleness_risk * weights.staleness,
        raw_metrics: metric_map(&[("daysSinceLastRelease", raw.days_since_last_release)]),
        normalized_metrics: metric_map(&[("stalenessRisk", Some(ctx.staleness_risk))]),
        weight: Some(weights.staleness),
        amplification: None,
        evidence: vec![EvidenceRef::dependency_metric(name, "daysSinceLastRelease")],
        confidence: metadata_confidence,
      },
      FactorTraceInput {
        factor_id: FactorId::DependencyMaintainerConcentration,
        family: RiskFactorFamily::External,
        strength: ctx.maintainer_concentration_risk * weights.maintainer_concentration,
        raw_metrics: metric_map(&[("maintainerCount", opt_count(raw.maintainer_count))]),
        normalized_metrics: metric_map(&[(
          "maintainerConcentrationRisk",
          Some(ctx.maintainer_concentration_risk),
        )]),
        weight: Some(weights.maintainer_concentration),
        amplification: None,
        evidence: vec![EvidenceRef::dependency_metric(name, "maintainerCount")],
        confidence: metadata_confidence,
      },
      FactorTraceInput {
        factor_id: FactorId::DependencyTopology,
        family: RiskFactorFamily::External,
        strength: ctx.transitive_burden_risk * weights.transitive_burden
          + ctx.centrality_risk * weights.centrality
          + ctx.chain_depth_risk * weights.chain_depth,
        raw_metrics: metric_map(&[
          ("transitiveCount", Some(raw.transitive_count as f64)),
          ("dependents", Some(f64::from(raw.dependents))),
          ("dependencyDepth", Some(f64::from(raw.dependency_depth))),
        ]),
        normalized_metrics: metric_map(&[
          ("transitiveBurdenRisk", Some(ctx.transitive_burden_risk)),
          ("centralityRisk", Some(ctx.centrality_risk)),
          ("chainDepthRisk", Some(ctx.chain_depth_risk)),
        ]),
        weight: Some(weights.transitive_burden + weights.centrality + weights.chain_depth),
        amplification: None,
        evidence: vec![EvidenceRef::dependency_metric(name, "dependencyDepth")],
        confidence: 1.0,
      },
      FactorTraceInput {
        factor_id: FactorId::DependencyBusFactor,
        family: RiskFactorFamily::External,
        strength: ctx.bus_factor_risk * weights.bus_factor_risk,
        raw_metrics: metric_map(&[("busFactor", opt_count(raw.bus_factor))]),
        normalized_metrics: metric_map(&[("busFactorRisk", Some(ctx.bus_factor_risk))]),
        weight: Some(weights.bus_factor_risk),
        amplification: None,
        evidence: vec![EvidenceRef::dependency_metric(name, "busFactor")],
        confidence: if raw.bus_factor.is_some() { 0.85 } else { 0.5 },
      },
      FactorTraceInput {
        factor_id: FactorId::DependencyPopularityDampening,
        family: RiskFactorFamily::Composite,
        strength: 1.0 - ctx.popularity_dampener,
        raw_metrics: metric_map(&[("weeklyDownloads", raw.weekly_downloads)]),
        normalized_metrics: metric_map(&[("popularityDampener", Some(ctx.popularity_dampener))]),
        weight: Some(config.dependency_signals.popularity_max_dampening),
        amplification: None,
        evidence: vec![EvidenceRef::dependency_metric(name, "weeklyDownloads")],
        confidence: if raw.weekly_downloads.is_some() { 0.9 } else { 0.4 },
      },
    ],
  );

  build_target_trace(
    TargetType::Dependency,
    name,
    dependency.score.score,
    dependency.score.normalized_score,
    factors,
  )
}
