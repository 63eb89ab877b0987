//! Fragile clusters: groups of files that fail together, either because they import each
//! other in a cycle or because history shows they keep changing together.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CouplingClusterConfig;
use crate::normalize::normalize_path;
use crate::stats::{average, clamp01, percentile, round4};
use crate::types::{ClusterKind, FileCoupling, FragileCluster, GraphCycle, RepositoryEvolutionSummary};

/// Normalized file score keyed by normalized path.
pub type FileRiskIndex = BTreeMap<String, f64>;

fn mean_risk(files: &[String], index: &FileRiskIndex) -> f64 {
  let values: Vec<f64> = files
    .iter()
    .map(|file| index.get(file).copied().unwrap_or(0.0))
    .collect();
  average(&values)
}

pub fn structural_cycle_clusters(cycles: &[GraphCycle], index: &FileRiskIndex) -> Vec<FragileCluster> {
  let mut clusters = Vec::new();

  for cycle in cycles {
    let members: BTreeSet<String> = cycle
      .nodes
      .iter()
      .map(|node| normalize_path(node))
      .filter(|file| index.contains_key(file))
      .collect();
    if members.len() < 2 {
      continue;
    }

    let files: Vec<String> = members.into_iter().collect();
    let size_risk = clamp01((files.len() as f64 - 1.0) / 5.0);
    let score = clamp01(mean_risk(&files, index) * 0.75 + size_risk * 0.25);

    clusters.push(FragileCluster {
      id: format!("cycle:{}", clusters.len() + 1),
      kind: ClusterKind::StructuralCycle,
      files,
      score: round4(score * 100.0),
    });
  }

  clusters
}

struct SelectedPair {
  file_a: String,
  file_b: String,
  coupling_score: f64,
}

fn select_coupled_pairs(
  pairs: &[FileCoupling],
  index: &FileRiskIndex,
  config: &CouplingClusterConfig,
) -> Vec<SelectedPair> {
  let candidates: Vec<&FileCoupling> = pairs
    .iter()
    .filter(|pair| pair.co_change_commits >= config.min_co_change_commits)
    .collect();
  let candidate_scores: Vec<f64> = candidates.iter().map(|pair| pair.coupling_score).collect();
  let threshold = config
    .floor_score
    .max(percentile(&candidate_scores, config.percentile_threshold));

  candidates
    .into_iter()
    .filter(|pair| pair.coupling_score >= threshold)
    .map(|pair| SelectedPair {
      file_a: normalize_path(&pair.file_a),
      file_b: normalize_path(&pair.file_b),
      coupling_score: pair.coupling_score,
    })
    .filter(|pair| {
      pair.file_a != pair.file_b && index.contains_key(&pair.file_a) && index.contains_key(&pair.file_b)
    })
    .collect()
}

/// Connected components of the strong-coupling graph, one cluster each.
pub fn change_coupling_clusters(
  evolution: &RepositoryEvolutionSummary,
  index: &FileRiskIndex,
  config: &CouplingClusterConfig,
) -> Vec<FragileCluster> {
  let pairs = match evolution {
    RepositoryEvolutionSummary::Available { coupling, .. } if !coupling.pairs.is_empty() => &coupling.pairs,
    _ => return Vec::new(),
  };

  let selected = select_coupled_pairs(pairs, index, config);
  let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
  for pair in &selected {
    adjacency
      .entry(pair.file_a.as_str())
      .or_default()
      .insert(pair.file_b.as_str());
    adjacency
      .entry(pair.file_b.as_str())
      .or_default()
      .insert(pair.file_a.as_str());
  }

  let mut visited: BTreeSet<&str> = BTreeSet::new();
  let mut clusters = Vec::new();

  for start in adjacency.keys() {
    if visited.contains(start) {
      continue;
    }

    let mut stack = vec![*start];
    let mut component: BTreeSet<&str> = BTreeSet::new();
    while let Some(current) = stack.pop() {
      if !visited.insert(current) {
        continue;
      }
      component.insert(current);
      if let Some(neighbors) = adjacency.get(current) {
        stack.extend(neighbors.iter().filter(|neighbor| !visited.contains(*neighbor)).copied());
      }
    }

    if component.len() < 2 {
      continue;
    }

    let coupling_scores: Vec<f64> = selected
      .iter()
      .filter(|pair| component.contains(pair.file_a.as_str()) && component.contains(pair.file_b.as_str()))
      .map(|pair| pair.coupling_score)
      .collect();
    let files: Vec<String> = component.into_iter().map(str::to_string).collect();
    let score = clamp01(mean_risk(&files, index) * 0.65 + average(&coupling_scores) * 0.35);

    clusters.push(FragileCluster {
      id: format!("coupling:{}", clusters.len() + 1),
      kind: ClusterKind::ChangeCoupling,
      files,
      score: round4(score * 100.0),
    });
  }

  clusters
}

/// Both cluster kinds, sorted by score desc, kind, then id.
pub fn detect_fragile_clusters(
  cycles: &[GraphCycle],
  evolution: &RepositoryEvolutionSummary,
  index: &FileRiskIndex,
  config: &CouplingClusterConfig,
) -> Vec<FragileCluster> {
  let mut clusters = structural_cycle_clusters(cycles, index);
  clusters.extend(change_coupling_clusters(evolution, index, config));
  clusters.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(Ordering::Equal)
      .then_with(|| a.kind.cmp(&b.kind))
      .then_with(|| a.id.cmp(&b.id))
  });
  clusters
}
