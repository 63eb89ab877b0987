//! Integration tests for the risk engine.

use codesentinel_risk_engine::trace::TargetType;
use codesentinel_risk_engine::types::{ClusterKind, DependencyRiskSignal};
use codesentinel_risk_engine::{
  compute_repository_risk_summary, evaluate_repository_risk, infer_module_name, EvaluationOptions,
  ExternalAnalysisSummary, GraphAnalysisSummary, RepositoryEvolutionSummary, RepositoryRiskSummary,
  RiskEngineConfig, RiskEvaluationInput,
};
use pretty_assertions::assert_eq;

fn structural_fixture() -> GraphAnalysisSummary {
  let json = r#"{
    "targetPath": "/repo",
    "nodes": [
      {"id": "src/a.ts", "absolutePath": "/repo/src/a.ts", "relativePath": "src/a.ts"},
      {"id": "src/b.ts", "absolutePath": "/repo/src/b.ts", "relativePath": "src/b.ts"},
      {"id": "src/c.ts", "absolutePath": "/repo/src/c.ts", "relativePath": "src/c.ts"}
    ],
    "edges": [
      {"from": "src/a.ts", "to": "src/b.ts"},
      {"from": "src/b.ts", "to": "src/a.ts"},
      {"from": "src/a.ts", "to": "src/c.ts"}
    ],
    "cycles": [{"nodes": ["src/a.ts", "src/b.ts"]}],
    "files": [
      {"id": "src/a.ts", "relativePath": "src/a.ts", "directDependencies": ["src/b.ts", "src/c.ts"], "fanIn": 2, "fanOut": 2, "depth": 1},
      {"id": "src/b.ts", "relativePath": "src/b.ts", "directDependencies": ["src/a.ts"], "fanIn": 1, "fanOut": 1, "depth": 1},
      {"id": "src/c.ts", "relativePath": "src/c.ts", "directDependencies": [], "fanIn": 1, "fanOut": 0, "depth": 2}
    ],
    "metrics": {"nodeCount": 3, "edgeCount": 3, "cycleCount": 1, "graphDepth": 2, "maxFanIn": 2, "maxFanOut": 2}
  }"#;
  serde_json::from_str(json).unwrap()
}

fn evolution_fixture() -> RepositoryEvolutionSummary {
  let json = r#"{
    "targetPath": "/repo",
    "available": true,
    "files": [
      {"filePath": "src/a.ts", "commitCount": 24, "churnAdded": 300, "churnDeleted": 220, "churnTotal": 520,
       "recentCommitCount": 12, "recentVolatility": 0.5, "topAuthorShare": 0.78, "busFactor": 1},
      {"filePath": "src/b.ts", "commitCount": 14, "churnAdded": 160, "churnDeleted": 100, "churnTotal": 260,
       "recentCommitCount": 4, "recentVolatility": 0.2857, "topAuthorShare": 0.85, "busFactor": 1},
      {"filePath": "src/c.ts", "commitCount": 5, "churnAdded": 30, "churnDeleted": 20, "churnTotal": 50,
       "recentCommitCount": 1, "recentVolatility": 0.2, "topAuthorShare": 0.4, "busFactor": 2}
    ],
    "coupling": {
      "pairs": [
        {"fileA": "src/a.ts", "fileB": "src/b.ts", "coChangeCommits": 10, "couplingScore": 0.72},
        {"fileA": "src/a.ts", "fileB": "src/c.ts", "coChangeCommits": 2, "couplingScore": 0.2}
      ],
      "totalPairCount": 2,
      "truncated": false
    }
  }"#;
  serde_json::from_str(json).unwrap()
}

fn external_fixture() -> ExternalAnalysisSummary {
  let json = r#"{
    "targetPath": "/repo",
    "available": true,
    "metrics": {"totalDependencies": 12, "directDependencies": 3, "dependencyDepth": 5, "lockfileKind": "pnpm"},
    "dependencies": [
      {"name": "react", "direct": true, "transitiveDependencies": ["scheduler", "loose-envify"],
       "weeklyDownloads": 12000000, "dependencyDepth": 2, "dependents": 10, "maintainerCount": 4,
       "daysSinceLastRelease": 28, "busFactor": 2,
       "ownRiskSignals": ["high_centrality"], "inheritedRiskSignals": []},
      {"name": "left-pad-legacy", "direct": true, "transitiveDependencies": ["micro-util", "legacy-core", "legacy-types"],
       "weeklyDownloads": 3200, "dependencyDepth": 4, "dependents": 2, "maintainerCount": 1,
       "daysSinceLastRelease": 900, "busFactor": 1,
       "ownRiskSignals": ["single_maintainer", "abandoned"], "inheritedRiskSignals": ["deep_chain", "high_fanout"]},
      {"name": "zod", "direct": true, "transitiveDependencies": [],
       "weeklyDownloads": 4300000, "dependencyDepth": 1, "dependents": 5, "maintainerCount": 3,
       "daysSinceLastRelease": 40, "busFactor": 2,
       "ownRiskSignals": [], "inheritedRiskSignals": []}
    ]
  }"#;
  serde_json::from_str(json).unwrap()
}

fn full_input() -> RiskEvaluationInput {
  RiskEvaluationInput::new(structural_fixture(), evolution_fixture(), external_fixture())
}

fn degraded_input() -> RiskEvaluationInput {
  let evolution: RepositoryEvolutionSummary =
    serde_json::from_str(r#"{"targetPath": "/repo", "available": false, "reason": "not_git_repository"}"#).unwrap();
  let external: ExternalAnalysisSummary =
    serde_json::from_str(r#"{"targetPath": "/repo", "available": false, "reason": "lockfile_not_found"}"#).unwrap();
  RiskEvaluationInput::new(structural_fixture(), evolution, external)
}

fn assert_score_pair(score: f64, normalized_score: f64, label: &str) {
  assert!(
    (0.0..=1.0).contains(&normalized_score),
    "{label}: normalized score {normalized_score} out of range"
  );
  assert!(
    (score - normalized_score * 100.0).abs() <= 0.0051,
    "{label}: score {score} does not match normalized {normalized_score}"
  );
}

fn assert_summary_scores(summary: &RepositoryRiskSummary) {
  assert_score_pair(summary.repository_score, summary.normalized_score, "repository");
  for file in &summary.file_scores {
    assert_score_pair(file.score, file.normalized_score, &file.file);
    for factor in [file.factors.structural, file.factors.evolution, file.factors.external] {
      assert!((0.0..=1.0).contains(&factor));
    }
  }
  for module in &summary.module_scores {
    assert_score_pair(module.score, module.normalized_score, &module.module);
  }
  for dependency in &summary.dependency_scores {
    assert_score_pair(dependency.score, dependency.normalized_score, &dependency.dependency);
  }
  for cluster in &summary.fragile_clusters {
    assert!((0.0..=100.0).contains(&cluster.score));
  }
  for zone in &summary.dependency_amplification_zones {
    assert!((0.0..=100.0).contains(&zone.score));
  }
}

#[test]
fn identical_inputs_produce_identical_summaries() {
  let first = compute_repository_risk_summary(&full_input());
  let second = compute_repository_risk_summary(&full_input());

  assert_eq!(first, second);
  assert_eq!(
    serde_json::to_string(&first).unwrap(),
    serde_json::to_string(&second).unwrap()
  );
}

#[test]
fn full_fixture_ranks_hub_file_and_legacy_dependency_first() {
  let summary = compute_repository_risk_summary(&full_input());

  assert!(summary.repository_score > 0.0);
  assert!(summary.normalized_score > 0.0);
  assert_eq!(summary.hotspots[0].file, "src/a.ts");
  assert!(summary
    .fragile_clusters
    .iter()
    .any(|cluster| cluster.kind == ClusterKind::StructuralCycle));
  assert!(summary
    .fragile_clusters
    .iter()
    .any(|cluster| cluster.kind == ClusterKind::ChangeCoupling));

  let legacy = &summary.dependency_scores[0];
  assert_eq!(legacy.dependency, "left-pad-legacy");
  assert!(legacy.own_risk_signals.contains(&DependencyRiskSignal::SingleMaintainer));
  assert!(legacy.own_risk_signals.contains(&DependencyRiskSignal::Abandoned));
  assert_eq!(summary.dependency_scores.len(), 3);
}

#[test]
fn missing_history_and_lockfile_degrade_gracefully() {
  let summary = compute_repository_risk_summary(&degraded_input());

  assert!(summary.repository_score > 0.0);
  assert!(summary.file_scores.iter().all(|file| file.factors.evolution == 0.0));
  assert!(summary.file_scores.iter().all(|file| file.factors.external == 0.0));
  assert!(summary.dependency_scores.is_empty());
  assert!(summary.dependency_amplification_zones.is_empty());
  assert!(summary
    .fragile_clusters
    .iter()
    .all(|cluster| cluster.kind == ClusterKind::StructuralCycle));
}

#[test]
fn external_pressure_creates_amplification_zones() {
  let summary = compute_repository_risk_summary(&full_input());
  let zones = &summary.dependency_amplification_zones;

  assert!(!zones.is_empty());
  assert_eq!(zones[0].file, "src/a.ts");
  assert!(zones[0].external_pressure > 0.0);
}

#[test]
fn every_emitted_score_is_consistent() {
  assert_summary_scores(&compute_repository_risk_summary(&full_input()));
  assert_summary_scores(&compute_repository_risk_summary(&degraded_input()));
}

#[test]
fn trace_contributions_reconcile_for_every_target() {
  let evaluation = evaluate_repository_risk(&full_input(), EvaluationOptions { explain: true });
  let trace = evaluation.trace.expect("explain mode returns a trace");

  assert_eq!(trace.schema_version, "1");
  assert_eq!(trace.contribution_tolerance, 0.0001);

  let summary = &evaluation.summary;
  let expected_targets =
    summary.file_scores.len() + summary.module_scores.len() + summary.dependency_scores.len() + 1;
  assert_eq!(trace.targets.len(), expected_targets);

  for target in &trace.targets {
    let sum: f64 = target.factors.iter().map(|factor| factor.contribution).sum();
    if target.total_score > 0.0 {
      assert!(
        (sum - target.total_score).abs() <= 1e-6,
        "{:?} {}: contributions {} vs total {}",
        target.target_type,
        target.target_id,
        sum,
        target.total_score
      );
    }
    assert!(target.dominant_factors.len() <= 3);
    assert_eq!(target.dominant_factors.len(), target.reduction_levers.len());
    for factor in &target.factors {
      assert!(factor.contribution >= 0.0);
      assert!((0.0..=1.0).contains(&factor.confidence));
    }
  }

  let types: Vec<TargetType> = trace.targets.iter().map(|target| target.target_type).collect();
  let mut sorted = types.clone();
  sorted.sort();
  assert_eq!(types, sorted);
}

#[test]
fn explain_mode_leaves_summary_untouched() {
  let plain = evaluate_repository_risk(&full_input(), EvaluationOptions::default());
  let explained = evaluate_repository_risk(&full_input(), EvaluationOptions { explain: true });

  assert!(plain.trace.is_none());
  assert!(explained.trace.is_some());
  assert_eq!(plain.summary, explained.summary);
}

#[test]
fn module_inference_matches_source_layout() {
  let config = RiskEngineConfig::default();
  assert_eq!(infer_module_name("src/app/widgets/x.ts", &config.module), "src/app");
  assert_eq!(infer_module_name("tools/y.ts", &config.module), "tools");
  assert_eq!(infer_module_name("z.ts", &config.module), "(root)");
}

#[test]
fn json_payload_with_partial_config_override() {
  let raw = r#"{
    "structural": {
      "targetPath": "/repo",
      "cycles": [{"nodes": ["src/a.ts", "src/b.ts"]}],
      "files": [
        {"id": "src/a.ts", "fanIn": 2, "fanOut": 2, "depth": 1},
        {"id": "src/b.ts", "fanIn": 1, "fanOut": 1, "depth": 1},
        {"id": "main.ts", "fanIn": 0, "fanOut": 1, "depth": 0}
      ]
    },
    "evolution": {"available": false, "reason": "not_git_repository"},
    "external": {"available": false, "reason": "lockfile_not_found"},
    "config": {"hotspotMaxFiles": 1, "module": {"rootLabel": "<top>"}}
  }"#;

  let input = RiskEvaluationInput::from_json_str(raw).unwrap();
  let config = input.config.clone().expect("config parsed");
  assert_eq!(config.hotspot_max_files, 1);
  assert_eq!(config.hotspot_min_files, 3);
  assert_eq!(config.module.max_prefix_segments, 2);

  let summary = compute_repository_risk_summary(&input);
  assert_eq!(summary.hotspots.len(), 1);
  assert!(summary.module_scores.iter().any(|module| module.module == "<top>"));
  assert!(summary.module_scores.iter().any(|module| module.module == "src"));
}

#[test]
fn available_history_without_payload_is_rejected() {
  let raw = r#"{
    "structural": {"targetPath": "/repo", "files": []},
    "evolution": {"available": true},
    "external": {"available": false, "reason": "lockfile_not_found"}
  }"#;
  let err = RiskEvaluationInput::from_json_str(raw).unwrap_err();
  assert!(err.to_string().contains("evolution.files"), "unexpected error: {err}");
}

#[test]
fn summary_serializes_with_wire_names() {
  let summary = compute_repository_risk_summary(&full_input());
  let value = serde_json::to_value(&summary).unwrap();

  assert!(value.get("repositoryScore").is_some());
  assert!(value.get("dependencyAmplificationZones").is_some());
  assert_eq!(value["dependencyScores"][0]["ownRiskSignals"][0], "single_maintainer");
  assert!(value["fragileClusters"]
    .as_array()
    .unwrap()
    .iter()
    .any(|cluster| cluster["kind"] == "structural_cycle"));
}
