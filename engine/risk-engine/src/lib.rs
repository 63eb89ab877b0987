//! CodeSentinel Risk Engine: deterministic, explainable repository risk scoring.
//!
//! Combines structural (dependency graph), evolution (git history) and external
//! (dependency health) summaries into file, module, dependency and repository scores,
//! detects fragile clusters and dependency amplification zones, and optionally emits a
//! reconciled per-factor contribution trace.
//!
//! No DB, no network, no clock; pure computation over typed inputs.

pub mod clusters;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod file_score;
pub mod modules;
pub mod normalize;
pub mod repository;
pub mod stats;
pub mod trace;
pub mod types;
pub mod zones;

pub use config::RiskEngineConfig;
pub use engine::{
  compute_repository_risk_summary, compute_risk_summary, evaluate_repository_risk, EvaluationOptions,
  RiskEvaluation, RiskEvaluationInput,
};
pub use error::EngineError;
pub use modules::infer_module_name;
pub use trace::{NoopTraceCollector, RecordingTraceCollector, RiskTrace, TraceCollector};
pub use types::{ExternalAnalysisSummary, GraphAnalysisSummary, RepositoryEvolutionSummary, RepositoryRiskSummary};
