//! Roll file scores up into path-prefix modules.

use std::collections::BTreeMap;

use crate::config::ModuleConfig;
use crate::normalize::normalize_path;
use crate::stats::{average, by_score_desc_then_id, clamp01, round4};
use crate::trace::{
  build_factor_traces, build_target_trace, metric_map, EvidenceRef, FactorId, FactorTraceInput,
  RiskFactorFamily, TargetTrace, TargetType,
};
use crate::types::{FileRiskScore, ModuleRiskScore};

const AVERAGE_WEIGHT: f64 = 0.65;
const PEAK_WEIGHT: f64 = 0.35;

/// `src/app/widgets/x.ts` -> `src/app`, `tools/y.ts` -> `tools`, `z.ts` -> root label.
pub fn infer_module_name(path: &str, config: &ModuleConfig) -> String {
  let path = normalize_path(path);
  let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
  if segments.len() <= 1 {
    return config.root_label.clone();
  }

  let first = segments[0];
  let is_source_root = config.common_source_roots.iter().any(|root| root == first);
  if !is_source_root || segments.len() <= config.max_prefix_segments {
    return first.to_string();
  }

  let prefix = config.max_prefix_segments.max(1);
  segments[..prefix].join("/")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleContext {
  pub score: ModuleRiskScore,
  pub average_file_risk: f64,
  pub peak_file_risk: f64,
}

/// Group by inferred module; sorted by score desc, then module name.
pub fn compute_module_scores(file_scores: &[FileRiskScore], config: &ModuleConfig) -> Vec<ModuleContext> {
  let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
  for file in file_scores {
    grouped
      .entry(infer_module_name(&file.file, config))
      .or_default()
      .push(file.normalized_score);
  }

  let mut modules: Vec<ModuleContext> = grouped
    .into_iter()
    .map(|(module, values)| {
      let average_file_risk = average(&values);
      let peak_file_risk = values.iter().copied().fold(0.0, f64::max);
      let normalized = clamp01(average_file_risk * AVERAGE_WEIGHT + peak_file_risk * PEAK_WEIGHT);

      ModuleContext {
        score: ModuleRiskScore {
          module,
          score: round4(normalized * 100.0),
          normalized_score: round4(normalized),
          file_count: values.len(),
        },
        average_file_risk,
        peak_file_risk,
      }
    })
    .collect();

  modules.sort_by(|a, b| by_score_desc_then_id(a.score.score, &a.score.module, b.score.score, &b.score.module));
  modules
}

pub fn module_trace(module: &ModuleContext) -> TargetTrace {
  let score = &module.score;
  let file_count = Some(score.file_count as f64);

  let factors = build_factor_traces(
    score.score,
    vec![
      FactorTraceInput {
        factor_id: FactorId::ModuleAverageFileRisk,
        family: RiskFactorFamily::Composite,
        strength: module.average_file_risk * AVERAGE_WEIGHT,
        raw_metrics: metric_map(&[
          ("averageFileRisk", Some(round4(module.average_file_risk))),
          ("fileCount", file_count),
        ]),
        normalized_metrics: metric_map(&[("normalizedModuleRisk", Some(score.normalized_score))]),
        weight: Some(AVERAGE_WEIGHT),
        amplification: None,
        evidence: vec![EvidenceRef::repository_metric("moduleAggregation.average")],
        confidence: 1.0,
      },
      FactorTraceInput {
        factor_id: FactorId::ModulePeakFileRisk,
        family: RiskFactorFamily::Composite,
        strength: module.peak_file_risk * PEAK_WEIGHT,
        raw_metrics: metric_map(&[
          ("peakFileRisk", Some(round4(module.peak_file_risk))),
          ("fileCount", file_count),
        ]),
        normalized_metrics: metric_map(&[("normalizedModuleRisk", Some(score.normalized_score))]),
        weight: Some(PEAK_WEIGHT),
        amplification: None,
        evidence: vec![EvidenceRef::repository_metric("moduleAggregation.peak")],
        confidence: 1.0,
      },
    ],
  );

  build_target_trace(
    TargetType::Module,
    &score.module,
    score.score,
    score.normalized_score,
    factors,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::RiskFactors;

  fn scored(file: &str, normalized_score: f64) -> FileRiskScore {
    FileRiskScore {
      file: file.to_string(),
      score: round4(normalized_score * 100.0),
      normalized_score,
      factors: RiskFactors::default(),
    }
  }

  #[test]
  fn module_names_follow_source_roots() {
    let config = ModuleConfig::default();
    assert_eq!(infer_module_name("src/app/widgets/x.ts", &config), "src/app");
    assert_eq!(infer_module_name("tools/y.ts", &config), "tools");
    assert_eq!(infer_module_name("z.ts", &config), "(root)");
    assert_eq!(infer_module_name("src/x.ts", &config), "src");
    assert_eq!(infer_module_name("//lib//net/socket.ts", &config), "lib/net");
    assert_eq!(infer_module_name("", &config), "(root)");
    assert_eq!(infer_module_name("src\\app\\x.ts", &config), "src/app");
    assert_eq!(infer_module_name("tools\\y.ts", &config), "tools");
  }

  #[test]
  fn module_naming_is_configurable() {
    let config = ModuleConfig {
      max_prefix_segments: 3,
      root_label: "<top>".into(),
      common_source_roots: vec!["pkg".into()],
    };
    assert_eq!(infer_module_name("pkg/a/b/c.go", &config), "pkg/a/b");
    assert_eq!(infer_module_name("pkg/a/b.go", &config), "pkg");
    assert_eq!(infer_module_name("src/app/x.ts", &config), "src");
    assert_eq!(infer_module_name("main.go", &config), "<top>");
  }

  #[test]
  fn modules_blend_average_and_peak() {
    let files = vec![
      scored("src/core/a.ts", 0.8),
      scored("src/core/b.ts", 0.2),
      scored("docs/readme.ts", 0.1),
    ];
    let modules = compute_module_scores(&files, &ModuleConfig::default());

    assert_eq!(modules.len(), 2);
    let core = &modules[0].score;
    assert_eq!(core.module, "src/core");
    assert_eq!(core.file_count, 2);
    // 0.5 * 0.65 + 0.8 * 0.35
    assert_eq!(core.normalized_score, 0.605);
    assert_eq!(modules[1].score.module, "docs");
  }

  #[test]
  fn module_trace_reconciles() {
    let files = vec![scored("src/core/a.ts", 0.8), scored("src/core/b.ts", 0.2)];
    let modules = compute_module_scores(&files, &ModuleConfig::default());
    let trace = module_trace(&modules[0]);

    let sum: f64 = trace.factors.iter().map(|factor| factor.contribution).sum();
    assert!((sum - trace.total_score).abs() < 1e-9);
    assert_eq!(trace.target_type, TargetType::Module);
    assert_eq!(trace.dominant_factors.len(), 2);
  }
}
