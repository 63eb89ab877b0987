//! Per-file risk: structural position, change history and dependency exposure, folded
//! together with their pairwise interactions.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::config::{DimensionWeights, RiskEngineConfig};
use crate::normalize::{
  build_quantile_scale, log_scale, normalize_path, normalize_with_scale, saturating_composite,
  QuantileScale,
};
use crate::stats::{by_score_desc_then_id, clamp01, round4};
use crate::trace::{
  build_factor_traces, build_target_trace, metric_map, EvidenceRef, FactorId, FactorTraceInput,
  RiskFactorFamily, TargetTrace, TargetType,
};
use crate::types::{
  FileEvolutionMetrics, FileRiskScore, GraphAnalysisSummary, Hotspot, RepositoryEvolutionSummary,
  RiskFactors,
};

/// Weighted dimension terms and interaction terms, rounded, as used by the trace.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FileTraceTerms {
  pub structural_base: f64,
  pub evolution_base: f64,
  pub external_base: f64,
  pub structural_evolution: f64,
  pub central_instability: f64,
  pub dependency_amplification: f64,
}

impl FileTraceTerms {
  pub fn interactions(&self) -> f64 {
    self.structural_evolution + self.central_instability + self.dependency_amplification
  }
}

/// Normalized (0..1) sub-metrics, rounded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FileNormalizedMetrics {
  pub fan_in_risk: f64,
  pub fan_out_risk: f64,
  pub depth_risk: f64,
  pub frequency_risk: f64,
  pub churn_risk: f64,
  pub volatility_risk: f64,
  pub ownership_concentration_risk: f64,
  pub bus_factor_risk: f64,
}

/// Everything known about one scored file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRiskContext {
  pub file: String,
  pub score: f64,
  pub normalized_score: f64,
  pub factors: RiskFactors,
  /// Mean of fan-in and fan-out risk; feeds interactions only.
  pub structural_centrality: f64,
  pub in_cycle: bool,
  pub evolution: Option<FileEvolutionMetrics>,
  pub fan_in: u32,
  pub fan_out: u32,
  pub depth: u32,
  pub dependency_affinity: f64,
  pub external_pressure: f64,
  pub terms: FileTraceTerms,
  pub normalized: FileNormalizedMetrics,
}

impl FileRiskContext {
  pub fn to_score(&self) -> FileRiskScore {
    FileRiskScore {
      file: self.file.clone(),
      score: self.score,
      normalized_score: self.normalized_score,
      factors: self.factors,
    }
  }
}

/// Dimension availability and external pressure shared by every file of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileScoringContext {
  pub dimension_weights: DimensionWeights,
  pub evolution_available: bool,
  pub external_available: bool,
  pub external_pressure: f64,
}

struct EvolutionScales {
  commit_count: QuantileScale,
  churn_total: QuantileScale,
  bus_factor: QuantileScale,
}

pub fn evolution_by_file(evolution: &RepositoryEvolutionSummary) -> BTreeMap<String, FileEvolutionMetrics> {
  match evolution {
    RepositoryEvolutionSummary::Available { files, .. } => files
      .iter()
      .map(|metrics| (normalize_path(&metrics.file_path), metrics.clone()))
      .collect(),
    RepositoryEvolutionSummary::Unavailable { .. } => BTreeMap::new(),
  }
}

fn evolution_scales(
  by_file: &BTreeMap<String, FileEvolutionMetrics>,
  config: &RiskEngineConfig,
) -> EvolutionScales {
  let clamp = config.quantile_clamp;
  let scale = |values: Vec<f64>| build_quantile_scale(&values, clamp.lower, clamp.upper);

  EvolutionScales {
    commit_count: scale(
      by_file
        .values()
        .map(|metrics| log_scale(f64::from(metrics.commit_count)))
        .collect(),
    ),
    churn_total: scale(
      by_file
        .values()
        .map(|metrics| log_scale(metrics.churn_total as f64))
        .collect(),
    ),
    bus_factor: scale(
      by_file
        .values()
        .map(|metrics| f64::from(metrics.bus_factor))
        .collect(),
    ),
  }
}

/// Score every structural file; sorted by score desc, then path.
pub fn compute_file_scores(
  structural: &GraphAnalysisSummary,
  evolution: &RepositoryEvolutionSummary,
  scoring: FileScoringContext,
  config: &RiskEngineConfig,
) -> Vec<FileRiskContext> {
  let by_file = evolution_by_file(evolution);
  let evo_scales = evolution_scales(&by_file, config);
  let cycle_files: BTreeSet<String> = structural
    .cycles
    .iter()
    .flat_map(|cycle| cycle.nodes.iter().map(|node| normalize_path(node)))
    .collect();

  let clamp = config.quantile_clamp;
  let scale = |values: Vec<f64>| build_quantile_scale(&values, clamp.lower, clamp.upper);
  let fan_in_scale = scale(
    structural
      .files
      .iter()
      .map(|file| log_scale(f64::from(file.fan_in)))
      .collect(),
  );
  let fan_out_scale = scale(
    structural
      .files
      .iter()
      .map(|file| log_scale(f64::from(file.fan_out)))
      .collect(),
  );
  let depth_scale = scale(structural.files.iter().map(|file| f64::from(file.depth)).collect());

  let sw = config.structural_factor_weights;
  let ew = config.evolution_factor_weights;
  let iw = config.interaction_weights;
  let dw = scoring.dimension_weights;

  let mut contexts: Vec<FileRiskContext> = structural
    .files
    .iter()
    .map(|file| {
      let path = normalize_path(&file.id);
      let in_cycle = cycle_files.contains(&path);
      let cycle_participation = if in_cycle { 1.0 } else { 0.0 };

      let fan_in_risk = normalize_with_scale(log_scale(f64::from(file.fan_in)), fan_in_scale);
      let fan_out_risk = normalize_with_scale(log_scale(f64::from(file.fan_out)), fan_out_scale);
      let depth_risk = normalize_with_scale(f64::from(file.depth), depth_scale);

      let structural_factor = clamp01(
        fan_in_risk * sw.fan_in
          + fan_out_risk * sw.fan_out
          + depth_risk * sw.depth
          + cycle_participation * sw.cycle_participation,
      );
      let structural_centrality = clamp01((fan_in_risk + fan_out_risk) / 2.0);

      let evolution_metrics = by_file.get(&path).filter(|_| scoring.evolution_available);
      let mut normalized = FileNormalizedMetrics {
        fan_in_risk: round4(fan_in_risk),
        fan_out_risk: round4(fan_out_risk),
        depth_risk: round4(depth_risk),
        ..FileNormalizedMetrics::default()
      };

      let evolution_factor = match evolution_metrics {
        Some(metrics) => {
          let frequency_risk =
            normalize_with_scale(log_scale(f64::from(metrics.commit_count)), evo_scales.commit_count);
          let churn_risk = normalize_with_scale(log_scale(metrics.churn_total as f64), evo_scales.churn_total);
          let volatility_risk = clamp01(metrics.recent_volatility);
          let ownership_concentration_risk = clamp01(metrics.top_author_share);
          let bus_factor_risk =
            clamp01(1.0 - normalize_with_scale(f64::from(metrics.bus_factor), evo_scales.bus_factor));

          normalized.frequency_risk = round4(frequency_risk);
          normalized.churn_risk = round4(churn_risk);
          normalized.volatility_risk = round4(volatility_risk);
          normalized.ownership_concentration_risk = round4(ownership_concentration_risk);
          normalized.bus_factor_risk = round4(bus_factor_risk);

          clamp01(
            frequency_risk * ew.frequency
              + churn_risk * ew.churn
              + volatility_risk * ew.recent_volatility
              + ownership_concentration_risk * ew.ownership_concentration
              + bus_factor_risk * ew.bus_factor_risk,
          )
        }
        None => 0.0,
      };

      let dependency_affinity = clamp01(structural_centrality * 0.6 + evolution_factor * 0.4);
      let external_factor = if scoring.external_available {
        clamp01(scoring.external_pressure * dependency_affinity)
      } else {
        0.0
      };

      let structural_base = structural_factor * dw.structural;
      let evolution_base = evolution_factor * dw.evolution;
      let external_base = external_factor * dw.external;
      let baseline = structural_base + evolution_base + external_base;

      let structural_evolution = structural_factor * evolution_factor * iw.structural_evolution;
      let central_instability = structural_centrality * evolution_factor * iw.central_instability;
      let dependency_amplification =
        external_factor * structural_factor.max(evolution_factor) * iw.dependency_amplification;

      let normalized_score = saturating_composite(
        baseline,
        &[structural_evolution, central_instability, dependency_amplification],
      );
      trace!(file = %path, normalized_score, structural_factor, evolution_factor, external_factor, "file scored");

      FileRiskContext {
        score: round4(normalized_score * 100.0),
        normalized_score: round4(normalized_score),
        factors: RiskFactors {
          structural: round4(structural_factor),
          evolution: round4(evolution_factor),
          external: round4(external_factor),
        },
        structural_centrality: round4(structural_centrality),
        in_cycle,
        evolution: evolution_metrics.cloned(),
        fan_in: file.fan_in,
        fan_out: file.fan_out,
        depth: file.depth,
        dependency_affinity: round4(dependency_affinity),
        external_pressure: scoring.external_pressure,
        terms: FileTraceTerms {
          structural_base: round4(structural_base),
          evolution_base: round4(evolution_base),
          external_base: round4(external_base),
          structural_evolution: round4(structural_evolution),
          central_instability: round4(central_instability),
          dependency_amplification: round4(dependency_amplification),
        },
        normalized,
        file: path,
      }
    })
    .collect();

  contexts.sort_by(|a, b| by_score_desc_then_id(a.score, &a.file, b.score, &b.file));
  contexts
}

/// `clamp(ceil(n * top_percent), min, max)` highest-scoring files; input must be ranked.
pub fn select_hotspots(file_scores: &[FileRiskScore], config: &RiskEngineConfig) -> Vec<Hotspot> {
  let wanted = (file_scores.len() as f64 * config.hotspot_top_percent).ceil() as usize;
  let count = wanted.max(config.hotspot_min_files).min(config.hotspot_max_files);

  file_scores
    .iter()
    .take(count)
    .map(|file| Hotspot {
      file: file.file.clone(),
      score: file.score,
      factors: file.factors,
    })
    .collect()
}

pub fn file_trace(
  ctx: &FileRiskContext,
  scoring: FileScoringContext,
  config: &RiskEngineConfig,
) -> TargetTrace {
  let file = ctx.file.as_str();
  let mut structural_evidence = vec![
    EvidenceRef::file_metric(file, "fanIn"),
    EvidenceRef::file_metric(file, "fanOut"),
    EvidenceRef::file_metric(file, "depth"),
  ];
  if ctx.in_cycle {
    structural_evidence.push(EvidenceRef::GraphCycle {
      cycle_id: format!("file:{}", file),
      files: vec![file.to_string()],
    });
  }

  let evo = ctx.evolution.as_ref();
  let n = ctx.normalized;
  let dw = scoring.dimension_weights;

  let factors = build_factor_traces(
    ctx.score,
    vec![
      FactorTraceInput {
        factor_id: FactorId::FileStructural,
        family: RiskFactorFamily::Structural,
        strength: ctx.terms.structural_base,
        raw_metrics: metric_map(&[
          ("fanIn", Some(f64::from(ctx.fan_in))),
          ("fanOut", Some(f64::from(ctx.fan_out))),
          ("depth", Some(f64::from(ctx.depth))),
          ("cycleParticipation", Some(if ctx.in_cycle { 1.0 } else { 0.0 })),
        ]),
        normalized_metrics: metric_map(&[
          ("fanInRisk", Some(n.fan_in_risk)),
          ("fanOutRisk", Some(n.fan_out_risk)),
          ("depthRisk", Some(n.depth_risk)),
          ("structuralFactor", Some(ctx.factors.structural)),
        ]),
        weight: Some(dw.structural),
        amplification: None,
        evidence: structural_evidence,
        confidence: 1.0,
      },
      FactorTraceInput {
        factor_id: FactorId::FileEvolution,
        family: RiskFactorFamily::Evolution,
        strength: ctx.terms.evolution_base,
        raw_metrics: metric_map(&[
          ("commitCount", evo.map(|m| f64::from(m.commit_count))),
          ("churnTotal", evo.map(|m| m.churn_total as f64)),
          ("recentVolatility", evo.map(|m| m.recent_volatility)),
          ("topAuthorShare", evo.map(|m| m.top_author_share)),
          ("busFactor", evo.map(|m| f64::from(m.bus_factor))),
        ]),
        normalized_metrics: metric_map(&[
          ("frequencyRisk", Some(n.frequency_risk)),
          ("churnRisk", Some(n.churn_risk)),
          ("volatilityRisk", Some(n.volatility_risk)),
          ("ownershipConcentrationRisk", Some(n.ownership_concentration_risk)),
          ("busFactorRisk", Some(n.bus_factor_risk)),
          ("evolutionFactor", Some(ctx.factors.evolution)),
        ]),
        weight: Some(dw.evolution),
        amplification: None,
        evidence: vec![EvidenceRef::file_metric(file, "commitCount")],
        confidence: if scoring.evolution_available { 1.0 } else { 0.0 },
      },
      FactorTraceInput {
        factor_id: FactorId::FileExternal,
        family: RiskFactorFamily::External,
        strength: ctx.terms.external_base,
        raw_metrics: metric_map(&[
          ("repositoryExternalPressure", Some(ctx.external_pressure)),
          ("dependencyAffinity", Some(ctx.dependency_affinity)),
        ]),
        normalized_metrics: metric_map(&[("externalFactor", Some(ctx.factors.external))]),
        weight: Some(dw.external),
        amplification: None,
        evidence: vec![EvidenceRef::repository_metric("repositoryExternalPressure")],
        confidence: if scoring.external_available { 0.7 } else { 0.0 },
      },
      FactorTraceInput {
        factor_id: FactorId::FileInteractions,
        family: RiskFactorFamily::Composite,
        strength: ctx.terms.interactions(),
        raw_metrics: metric_map(&[
          ("structuralEvolutionInteraction", Some(ctx.terms.structural_evolution)),
          ("centralInstabilityInteraction", Some(ctx.terms.central_instability)),
          ("dependencyAmplificationInteraction", Some(ctx.terms.dependency_amplification)),
        ]),
        normalized_metrics: metric_map(&[]),
        weight: None,
        amplification: Some(config.interaction_weights.total()),
        evidence: vec![EvidenceRef::repository_metric("interactionWeights")],
        confidence: 0.9,
      },
    ],
  );

  build_target_trace(TargetType::File, file, ctx.score, ctx.normalized_score, factors)
}
