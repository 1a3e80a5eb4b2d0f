//! Multi-hypothesis tracking core.
//!
//! Data association is deferred across frames: every way the new reports
//! can extend the existing track hypotheses (continue, skip, new track,
//! false alarm) is kept as a branch of the hypothesis forest, scored by
//! accumulated log-likelihood, and resolved `max_depth` frames later by
//! N-scan pruning along the best global hypothesis.
//!
//! The public surface is [`MultiObjectTracker`] with the
//! `predict` / `update` contract; everything else backs it:
//!
//! - [`ObjectModel`] — transition likelihoods, gating, successor states
//! - [`HypothesisForest`] — the branch / enumerate / prune / commit engine
//! - [`TrackRegistry`] — committed event stream materialized into tracks

pub mod config;
pub mod errors;
pub mod forest;
pub mod model;
pub mod object;
pub mod registry;
pub mod state;
pub mod tracker;
pub mod tree;

pub use config::{TrackerConfig, TrackerConfigBuilder};
pub use errors::{ConfigError, TrackerError};
pub use forest::{GlobalHypothesis, HypothesisForest, TrackListener};
pub use model::ObjectModel;
pub use object::{Object, ObjectReport, ReferencePointSource, ReferencePointType};
pub use registry::{FalseAlarm, Sample, Track, TrackRegistry};
pub use state::ObjectState;
pub use tracker::MultiObjectTracker;
pub use tree::{BranchKind, HypothesisNode, NodeArena, NodeId, ReportSummary};
