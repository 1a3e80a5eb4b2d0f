//! The multi-hypothesis engine: branch, enumerate, prune, commit.
//!
//! Every frame runs one measure cycle:
//!
//! 1. **Branch** — each live leaf spawns a skip child, an end child (once
//!    the branch has skipped at least once), and one gated detection child
//!    per admissible report. Each report additionally offers a new-track
//!    root and a clutter disposition.
//! 2. **Enumerate** — every surviving global hypothesis is extended by all
//!    joint choices that consume each report at most once, scored by summed
//!    branch log-likelihoods.
//! 3. **Prune** — keep the top `max_g_hypos` globals, then drop any whose
//!    score ratio to the best falls below `min_g_hypo_ratio`.
//! 4. **Commit** — N-scan: ancestors `max_depth` frames behind the best
//!    global's leaves become final. Committed branches fire the
//!    [`TrackListener`] hooks, siblings of the committed path are freed,
//!    and globals that disagreed with the commitment are discarded.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::mht::model::ObjectModel;
use crate::mht::object::ObjectReport;
use crate::mht::state::ObjectState;
use crate::mht::tree::{BranchKind, HypothesisNode, NodeArena, NodeId, ReportSummary};

/// Stable identifier of one track hypothesis tree.
pub type TreeId = u32;

/// Upper bound on child globals generated per frame before truncation.
const MAX_GLOBAL_CANDIDATES: usize = 4096;

/// Hooks fired as branches become committed at the N-scan horizon.
///
/// Events arrive in deterministic order, sorted by track id then frame
/// number; false alarms follow the track events sorted by frame.
pub trait TrackListener {
    /// A new track was confirmed. `report` is the observation that seeded it.
    fn start_track(
        &mut self,
        track_id: u64,
        hypothesis_id: u64,
        state: &ObjectState,
        report: &ReportSummary,
    );

    /// A confirmed track consumed a report this frame.
    fn continue_track(
        &mut self,
        track_id: u64,
        hypothesis_id: u64,
        state: &ObjectState,
        report: &ReportSummary,
    );

    /// A confirmed track aged forward without a report.
    fn skip_track(&mut self, track_id: u64, hypothesis_id: u64, frame: u32, state: &ObjectState);

    /// A confirmed track ended.
    fn end_track(&mut self, track_id: u64, hypothesis_id: u64);

    /// A report was committed as clutter.
    fn false_alarm(&mut self, hypothesis_id: u64, report: &ReportSummary);
}

/// A report written off as clutter by one global hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClutterRecord {
    frame: u32,
    x: f64,
    y: f64,
    corner_id: usize,
}

/// A maximum-weight set of compatible track-hypothesis leaves.
///
/// No two selected leaves consume the same report in the same frame. The
/// score is the sum of the selected leaves' branch log-likelihoods plus the
/// accumulated clutter log-likelihoods.
#[derive(Debug, Clone)]
pub struct GlobalHypothesis {
    score: f64,
    /// One leaf per participating tree, sorted by tree id.
    leaves: Vec<(TreeId, NodeId)>,
    clutter: Vec<ClutterRecord>,
}

impl GlobalHypothesis {
    /// Total score in log space
    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Number of track hypothesis leaves selected by this global
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }
}

#[derive(Debug)]
struct TrackTree {
    /// Chain head: the deepest committed node, or the start node while
    /// nothing has committed yet.
    root: NodeId,
    /// Assigned when the start node commits
    track_id: Option<u64>,
}

/// Branch options generated for one live leaf this frame.
struct LeafChoices {
    skip: NodeId,
    end: Option<NodeId>,
    detects: Vec<(usize, NodeId)>,
}

/// Event captured at commit time and emitted after the cycle, in order.
enum PendingEvent {
    Start {
        track_id: u64,
        hypothesis_id: u64,
        frame: u32,
        state: ObjectState,
        report: ReportSummary,
    },
    Continue {
        track_id: u64,
        hypothesis_id: u64,
        frame: u32,
        state: ObjectState,
        report: ReportSummary,
    },
    Skip {
        track_id: u64,
        hypothesis_id: u64,
        frame: u32,
        state: ObjectState,
    },
    End {
        track_id: u64,
        hypothesis_id: u64,
        frame: u32,
    },
    FalseAlarm {
        hypothesis_id: u64,
        report: ReportSummary,
    },
}

impl PendingEvent {
    fn sort_key(&self) -> (u8, u64, u32) {
        match self {
            PendingEvent::Start {
                track_id, frame, ..
            }
            | PendingEvent::Continue {
                track_id, frame, ..
            }
            | PendingEvent::Skip {
                track_id, frame, ..
            }
            | PendingEvent::End {
                track_id, frame, ..
            } => (0, *track_id, *frame),
            PendingEvent::FalseAlarm { report, .. } => (1, 0, report.frame),
        }
    }
}

/// The hypothesis forest: arena, track trees, and surviving globals.
#[derive(Debug)]
pub struct HypothesisForest {
    arena: NodeArena,
    trees: BTreeMap<TreeId, TrackTree>,
    globals: Vec<GlobalHypothesis>,
    next_tree_id: TreeId,
    next_track_id: u64,
    max_depth: u32,
    min_g_hypo_log_ratio: f64,
    max_g_hypos: usize,
}

impl HypothesisForest {
    /// Create an empty forest with one empty global hypothesis.
    pub fn new(max_depth: u32, min_g_hypo_ratio: f64, max_g_hypos: usize) -> Self {
        Self {
            arena: NodeArena::new(),
            trees: BTreeMap::new(),
            globals: vec![GlobalHypothesis {
                score: 0.0,
                leaves: Vec::new(),
                clutter: Vec::new(),
            }],
            next_tree_id: 0,
            next_track_id: 0,
            max_depth,
            min_g_hypo_log_ratio: min_g_hypo_ratio.ln(),
            max_g_hypos,
        }
    }

    /// Number of surviving global hypotheses
    #[inline]
    pub fn num_globals(&self) -> usize {
        self.globals.len()
    }

    /// Number of live track hypothesis trees
    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of live hypothesis nodes
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.arena.len()
    }

    /// The best surviving global hypothesis
    pub fn best_global(&self) -> Option<&GlobalHypothesis> {
        self.globals.first()
    }

    /// Advance every live leaf's filter by one time step.
    ///
    /// Leaves are marked advanced so the next measure cycle does not step
    /// them a second time; calling twice advances twice.
    pub fn predict_leaves(&mut self) {
        let live = self.live_leaves();
        for (_, node_id) in live {
            if let Some(node) = self.arena.get_mut(node_id) {
                node.state.advance();
            }
        }
    }

    /// Run one measure cycle for `frame` over `reports`.
    pub fn measure(
        &mut self,
        model: &ObjectModel,
        reports: &[ObjectReport],
        frame: u32,
        listener: &mut dyn TrackListener,
    ) {
        let choices = self.branch_leaves(model, reports, frame);
        let starts = self.create_start_trees(model, reports, frame);
        self.extend_globals(&choices, &starts, reports, frame);

        let mut events = Vec::new();
        self.commit_best(frame, &mut events);
        self.commit_clutter(frame, &mut events);
        self.collect_garbage(frame, &mut events);

        events.sort_by_key(PendingEvent::sort_key);
        for event in events {
            match event {
                PendingEvent::Start {
                    track_id,
                    hypothesis_id,
                    state,
                    report,
                    ..
                } => listener.start_track(track_id, hypothesis_id, &state, &report),
                PendingEvent::Continue {
                    track_id,
                    hypothesis_id,
                    state,
                    report,
                    ..
                } => listener.continue_track(track_id, hypothesis_id, &state, &report),
                PendingEvent::Skip {
                    track_id,
                    hypothesis_id,
                    frame,
                    state,
                } => listener.skip_track(track_id, hypothesis_id, frame, &state),
                PendingEvent::End {
                    track_id,
                    hypothesis_id,
                    ..
                } => listener.end_track(track_id, hypothesis_id),
                PendingEvent::FalseAlarm {
                    hypothesis_id,
                    report,
                } => listener.false_alarm(hypothesis_id, &report),
            }
        }

        tracing::debug!(
            frame,
            globals = self.globals.len(),
            trees = self.trees.len(),
            nodes = self.arena.len(),
            "measure cycle complete"
        );
    }

    /// Distinct non-terminal leaves referenced by surviving globals.
    fn live_leaves(&self) -> BTreeSet<(TreeId, NodeId)> {
        let mut live = BTreeSet::new();
        for global in &self.globals {
            for &(tree_id, node_id) in &global.leaves {
                if let Some(node) = self.arena.get(node_id) {
                    if !node.kind.is_end() {
                        live.insert((tree_id, node_id));
                    }
                }
            }
        }
        live
    }

    fn insert_child(
        &mut self,
        parent: NodeId,
        state: ObjectState,
        kind: BranchKind,
        frame: u32,
    ) -> NodeId {
        let log_likelihood = state.log_likelihood();
        let id = self.arena.insert(HypothesisNode {
            parent: Some(parent),
            children: SmallVec::new(),
            state,
            kind,
            frame,
            log_likelihood,
            committed: false,
        });
        self.arena
            .get_mut(parent)
            .expect("parent node is live")
            .children
            .push(id);
        id
    }

    /// Spawn skip, end, and gated detection children for every live leaf.
    fn branch_leaves(
        &mut self,
        model: &ObjectModel,
        reports: &[ObjectReport],
        frame: u32,
    ) -> BTreeMap<(TreeId, NodeId), LeafChoices> {
        let mut choices = BTreeMap::new();
        for (tree_id, leaf_id) in self.live_leaves() {
            let (parent_state, parent_ll) = {
                let node = self.arena.get(leaf_id).expect("live leaf");
                (node.state.clone(), node.log_likelihood)
            };

            let skip_state = model
                .new_state(0, &parent_state, None)
                .expect("skip branch always exists");
            let skip = self.insert_child(leaf_id, skip_state, BranchKind::Skip, frame);

            // An end branch directly after a detection would carry ln 0.
            let end = if parent_state.times_skipped() > 0 {
                let mut end_state = parent_state.clone();
                end_state
                    .set_log_likelihood(parent_ll + model.end_log_likelihood(&parent_state));
                Some(self.insert_child(leaf_id, end_state, BranchKind::End, frame))
            } else {
                None
            };

            let mut detects = Vec::new();
            for (report_index, report) in reports.iter().enumerate() {
                if let Some(detect_state) = model.new_state(0, &parent_state, Some(report)) {
                    let measurement = model.resolved_measurement(&parent_state, report);
                    let summary = ReportSummary {
                        frame,
                        x: measurement.x,
                        y: measurement.y,
                        corner_id: report.corner_id(),
                    };
                    let id = self.insert_child(
                        leaf_id,
                        detect_state,
                        BranchKind::Detect { report: summary },
                        frame,
                    );
                    detects.push((report_index, id));
                }
            }

            choices.insert((tree_id, leaf_id), LeafChoices { skip, end, detects });
        }
        choices
    }

    /// One candidate new-track tree per report.
    fn create_start_trees(
        &mut self,
        model: &ObjectModel,
        reports: &[ObjectReport],
        frame: u32,
    ) -> Vec<(TreeId, NodeId)> {
        let mut starts = Vec::with_capacity(reports.len());
        for report in reports {
            let state = model.initial_state(report);
            let summary = ReportSummary {
                frame,
                x: state.x(),
                y: state.y(),
                corner_id: report.corner_id(),
            };
            let log_likelihood = state.log_likelihood();
            let node = self.arena.insert(HypothesisNode {
                parent: None,
                children: SmallVec::new(),
                state,
                kind: BranchKind::Start { report: summary },
                frame,
                log_likelihood,
                committed: false,
            });
            let tree_id = self.next_tree_id;
            self.next_tree_id += 1;
            self.trees.insert(tree_id, TrackTree {
                root: node,
                track_id: None,
            });
            starts.push((tree_id, node));
        }
        starts
    }

    /// Extend every surviving global with all compatible joint choices,
    /// then apply top-K and ratio pruning.
    fn extend_globals(
        &mut self,
        choices: &BTreeMap<(TreeId, NodeId), LeafChoices>,
        starts: &[(TreeId, NodeId)],
        reports: &[ObjectReport],
        frame: u32,
    ) {
        let mut candidates: Vec<GlobalHypothesis> = Vec::new();
        for parent in &self.globals {
            let mut terminal = Vec::new();
            let mut live = Vec::new();
            for key in &parent.leaves {
                match choices.get(key) {
                    Some(leaf_choices) => live.push((*key, leaf_choices)),
                    None => terminal.push(*key),
                }
            }

            let mut enumeration = Enumeration {
                parent,
                live: &live,
                starts,
                reports,
                frame,
                arena: &self.arena,
                out: &mut candidates,
                used: vec![false; reports.len()],
                leaves: terminal,
                clutter: Vec::new(),
                score: 0.0,
            };
            enumeration.assign_leaf(0);

            if candidates.len() >= MAX_GLOBAL_CANDIDATES {
                tracing::debug!(frame, "global hypothesis candidates truncated");
                break;
            }
        }

        if candidates.is_empty() {
            candidates.push(GlobalHypothesis {
                score: 0.0,
                leaves: Vec::new(),
                clutter: Vec::new(),
            });
        }

        // Identical leaf sets from different parents keep the best score.
        candidates.sort_by(|a, b| {
            a.leaves
                .cmp(&b.leaves)
                .then(compare_scores(b.score, a.score))
        });
        candidates.dedup_by(|a, b| a.leaves == b.leaves);

        candidates.sort_by(|a, b| {
            compare_scores(b.score, a.score).then(a.leaves.cmp(&b.leaves))
        });
        candidates.truncate(self.max_g_hypos);

        let best_score = candidates[0].score;
        let floor = self.min_g_hypo_log_ratio;
        candidates.retain(|g| g.score - best_score >= floor - 1e-12);

        self.globals = candidates;
    }

    /// N-scan commit along the best global hypothesis.
    fn commit_best(&mut self, frame: u32, events: &mut Vec<PendingEvent>) {
        let Some(horizon) = frame.checked_sub(self.max_depth) else {
            return;
        };
        let Some(best) = self.globals.first().cloned() else {
            return;
        };

        let mut finished = Vec::new();
        for (tree_id, leaf) in best.leaves {
            let path = self.arena.path_from_root(leaf);
            for node_id in path {
                let (node_frame, is_end) = {
                    let node = self.arena.get(node_id).expect("path node is live");
                    (node.frame, node.kind.is_end())
                };
                if node_frame > horizon {
                    break;
                }
                if !self.arena.get(node_id).expect("path node").committed {
                    self.commit_node(tree_id, node_id, events);
                }
                self.advance_root(tree_id, node_id);
                if is_end {
                    finished.push(tree_id);
                    break;
                }
            }
        }

        // Globals whose branches were pruned away disagree with the
        // commitment; the best global survives by construction. This must
        // run before finished trees are stripped, so stale leaves still
        // betray the disagreeing globals.
        let arena = &self.arena;
        let trees = &self.trees;
        self.globals.retain(|global| {
            global
                .leaves
                .iter()
                .all(|&(tree_id, node_id)| trees.contains_key(&tree_id) && arena.contains(node_id))
        });

        for tree_id in finished {
            if let Some(tree) = self.trees.remove(&tree_id) {
                self.arena.remove_subtree(tree.root);
            }
            for global in &mut self.globals {
                global.leaves.retain(|&(t, _)| t != tree_id);
            }
        }
    }

    fn commit_node(&mut self, tree_id: TreeId, node_id: NodeId, events: &mut Vec<PendingEvent>) {
        let kind = self.arena.get(node_id).expect("committed node").kind;
        let track_id = match kind {
            BranchKind::Start { .. } => {
                let id = self.next_track_id;
                self.next_track_id += 1;
                self.trees
                    .get_mut(&tree_id)
                    .expect("tree of committed node")
                    .track_id = Some(id);
                id
            }
            _ => self
                .trees
                .get(&tree_id)
                .expect("tree of committed node")
                .track_id
                .expect("start node commits first"),
        };

        let hypothesis_id = u64::from(tree_id);
        let node = self.arena.get_mut(node_id).expect("committed node");
        node.committed = true;
        match node.kind {
            BranchKind::Start { report } => events.push(PendingEvent::Start {
                track_id,
                hypothesis_id,
                frame: node.frame,
                state: node.state.clone(),
                report,
            }),
            BranchKind::Detect { report } => events.push(PendingEvent::Continue {
                track_id,
                hypothesis_id,
                frame: node.frame,
                state: node.state.clone(),
                report,
            }),
            BranchKind::Skip => events.push(PendingEvent::Skip {
                track_id,
                hypothesis_id,
                frame: node.frame,
                state: node.state.clone(),
            }),
            BranchKind::End => events.push(PendingEvent::End {
                track_id,
                hypothesis_id,
                frame: node.frame,
            }),
        }
    }

    /// Make `node_id` the new chain head: prune its siblings and free the
    /// old head above it.
    fn advance_root(&mut self, tree_id: TreeId, node_id: NodeId) {
        let tree = self.trees.get_mut(&tree_id).expect("live tree");
        if tree.root == node_id {
            return;
        }
        let parent_id = self
            .arena
            .get(node_id)
            .expect("advancing node")
            .parent
            .expect("non-root node has a parent");
        debug_assert_eq!(parent_id, tree.root);

        let siblings: Vec<NodeId> = self
            .arena
            .get(parent_id)
            .expect("old chain head")
            .children
            .iter()
            .copied()
            .filter(|&child| child != node_id)
            .collect();
        for sibling in siblings {
            self.arena.remove_subtree(sibling);
        }
        self.arena.remove(parent_id);
        self.arena
            .get_mut(node_id)
            .expect("advancing node")
            .parent = None;
        tree.root = node_id;
    }

    /// Emit clutter decisions of the best global past the horizon and drop
    /// stale records everywhere.
    fn commit_clutter(&mut self, frame: u32, events: &mut Vec<PendingEvent>) {
        let Some(horizon) = frame.checked_sub(self.max_depth) else {
            return;
        };
        if let Some(best) = self.globals.first() {
            for record in best.clutter.iter().filter(|r| r.frame <= horizon) {
                events.push(PendingEvent::FalseAlarm {
                    hypothesis_id: 0,
                    report: ReportSummary {
                        frame: record.frame,
                        x: record.x,
                        y: record.y,
                        corner_id: record.corner_id,
                    },
                });
            }
        }
        for global in &mut self.globals {
            global.clutter.retain(|record| record.frame > horizon);
        }
    }

    /// Remove trees no surviving global references. A tree that had already
    /// started a track ends it.
    fn collect_garbage(&mut self, frame: u32, events: &mut Vec<PendingEvent>) {
        let referenced: BTreeSet<TreeId> = self
            .globals
            .iter()
            .flat_map(|global| global.leaves.iter().map(|&(tree_id, _)| tree_id))
            .collect();
        let unreferenced: Vec<TreeId> = self
            .trees
            .keys()
            .copied()
            .filter(|tree_id| !referenced.contains(tree_id))
            .collect();

        for tree_id in unreferenced {
            let tree = self.trees.remove(&tree_id).expect("unreferenced tree");
            if let Some(track_id) = tree.track_id {
                events.push(PendingEvent::End {
                    track_id,
                    hypothesis_id: u64::from(tree_id),
                    frame,
                });
            }
            self.arena.remove_subtree(tree.root);
        }
    }
}

fn compare_scores(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Depth-first joint assignment over live leaves, then over reports.
struct Enumeration<'a> {
    parent: &'a GlobalHypothesis,
    live: &'a [((TreeId, NodeId), &'a LeafChoices)],
    starts: &'a [(TreeId, NodeId)],
    reports: &'a [ObjectReport],
    frame: u32,
    arena: &'a NodeArena,
    out: &'a mut Vec<GlobalHypothesis>,
    used: Vec<bool>,
    leaves: Vec<(TreeId, NodeId)>,
    clutter: Vec<ClutterRecord>,
    score: f64,
}

impl Enumeration<'_> {
    fn assign_leaf(&mut self, index: usize) {
        if self.out.len() >= MAX_GLOBAL_CANDIDATES {
            return;
        }
        if index == self.live.len() {
            self.assign_report(0);
            return;
        }

        let ((tree_id, leaf_id), choices) = self.live[index];
        let parent_ll = self
            .arena
            .get(leaf_id)
            .expect("live leaf")
            .log_likelihood;

        for &(report_index, node_id) in &choices.detects {
            if self.used[report_index] {
                continue;
            }
            self.used[report_index] = true;
            self.with_leaf(tree_id, node_id, parent_ll, index);
            self.used[report_index] = false;
        }

        self.with_leaf(tree_id, choices.skip, parent_ll, index);

        if let Some(end_id) = choices.end {
            self.with_leaf(tree_id, end_id, parent_ll, index);
        }
    }

    fn with_leaf(&mut self, tree_id: TreeId, node_id: NodeId, parent_ll: f64, index: usize) {
        let delta = self.arena.get(node_id).expect("child node").log_likelihood - parent_ll;
        self.leaves.push((tree_id, node_id));
        self.score += delta;
        self.assign_leaf(index + 1);
        self.score -= delta;
        self.leaves.pop();
    }

    fn assign_report(&mut self, index: usize) {
        if self.out.len() >= MAX_GLOBAL_CANDIDATES {
            return;
        }
        if index == self.reports.len() {
            self.emit();
            return;
        }
        if self.used[index] {
            self.assign_report(index + 1);
            return;
        }

        // New track
        let (tree_id, node_id) = self.starts[index];
        let delta = self.arena.get(node_id).expect("start node").log_likelihood;
        self.leaves.push((tree_id, node_id));
        self.score += delta;
        self.assign_report(index + 1);
        self.score -= delta;
        self.leaves.pop();

        // Clutter
        let (false_alarm_ll, reference_point, corner_id) = {
            let report = &self.reports[index];
            (
                report.false_alarm_log_likelihood(),
                report.reference_point(),
                report.corner_id(),
            )
        };
        self.clutter.push(ClutterRecord {
            frame: self.frame,
            x: reference_point.x,
            y: reference_point.y,
            corner_id,
        });
        self.score += false_alarm_ll;
        self.assign_report(index + 1);
        self.score -= false_alarm_ll;
        self.clutter.pop();
    }

    fn emit(&mut self) {
        let mut leaves = self.leaves.clone();
        leaves.sort_unstable();
        let mut clutter = self.parent.clutter.clone();
        clutter.extend(self.clutter.iter().copied());
        self.out.push(GlobalHypothesis {
            score: self.parent.score + self.score,
            leaves,
            clutter,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mht::config::TrackerConfig;
    use crate::mht::object::{Object, ReferencePointType};
    use nalgebra::Vector2;
    use smallvec::SmallVec;

    #[derive(Default)]
    struct RecordingListener {
        events: Vec<String>,
    }

    impl TrackListener for RecordingListener {
        fn start_track(
            &mut self,
            track_id: u64,
            _hypothesis_id: u64,
            state: &ObjectState,
            report: &ReportSummary,
        ) {
            self.events.push(format!(
                "start {} f{} ({:.2},{:.2})",
                track_id, report.frame, state.x(), state.y()
            ));
        }

        fn continue_track(
            &mut self,
            track_id: u64,
            _hypothesis_id: u64,
            _state: &ObjectState,
            report: &ReportSummary,
        ) {
            self.events.push(format!("continue {} f{}", track_id, report.frame));
        }

        fn skip_track(
            &mut self,
            track_id: u64,
            _hypothesis_id: u64,
            frame: u32,
            _state: &ObjectState,
        ) {
            self.events.push(format!("skip {} f{}", track_id, frame));
        }

        fn end_track(&mut self, track_id: u64, _hypothesis_id: u64) {
            self.events.push(format!("end {}", track_id));
        }

        fn false_alarm(&mut self, _hypothesis_id: u64, report: &ReportSummary) {
            self.events.push(format!("clutter f{}", report.frame));
        }
    }

    fn report(x: f64, y: f64, frame: u32, false_alarm_likelihood: f64) -> ObjectReport {
        let object = Object::new(
            Vector2::new(x, y),
            ReferencePointType::Centroid,
            SmallVec::new(),
            0,
        );
        ObjectReport::new(object, frame, false_alarm_likelihood.ln())
    }

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            start_likelihood: 0.4,
            detect_likelihood: 0.9,
            false_alarm_likelihood: 0.01,
            max_depth: 2,
            min_g_hypo_ratio: 1e-6,
            max_g_hypos: 50,
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn test_empty_frames_keep_single_empty_global() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(2, 1e-6, 50);
        let mut listener = RecordingListener::default();

        for frame in 0..3 {
            forest.measure(&model, &[], frame, &mut listener);
        }

        assert_eq!(forest.num_globals(), 1);
        assert_eq!(forest.num_trees(), 0);
        assert!(listener.events.is_empty());
    }

    #[test]
    fn test_persistent_report_commits_one_track() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(2, 1e-6, 50);
        let mut listener = RecordingListener::default();

        for frame in 0..5 {
            let reports = vec![report(1.0, 0.0, frame, 0.01)];
            forest.measure(&model, &reports, frame, &mut listener);
        }

        // Frames 0..=2 are past the horizon by frame 4.
        assert!(listener.events.iter().any(|e| e.starts_with("start 0 f0")));
        assert!(listener.events.iter().any(|e| e.starts_with("continue 0 f1")));
        assert!(listener.events.iter().any(|e| e.starts_with("continue 0 f2")));
        assert!(!listener.events.iter().any(|e| e.starts_with("end")));
        assert!(!listener.events.iter().any(|e| e.starts_with("clutter")));
    }

    #[test]
    fn test_skip_branch_delta_is_skip_likelihood() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(4, 1e-9, 50);
        let mut listener = RecordingListener::default();

        forest.measure(&model, &[report(0.0, 0.0, 0, 0.01)], 0, &mut listener);
        forest.measure(&model, &[], 1, &mut listener);

        // After an empty frame every continuing leaf is a skip child. With
        // a zero skip streak the continue term vanishes, so the branch
        // score drops by exactly the skip log-likelihood.
        let mut checked = 0;
        for global in &forest.globals {
            for &(_, leaf) in &global.leaves {
                let node = forest.arena.get(leaf).unwrap();
                if !matches!(node.kind, BranchKind::Skip) {
                    continue;
                }
                let parent = forest.arena.get(node.parent.unwrap()).unwrap();
                let delta = node.log_likelihood - parent.log_likelihood;
                assert!((delta - model.skip_log_likelihood()).abs() < 1e-9);
                assert_eq!(node.state.times_skipped(), 1);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_times_skipped_counts_skip_edges() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(8, 1e-9, 50);
        let mut listener = RecordingListener::default();

        forest.measure(&model, &[report(0.0, 0.0, 0, 0.01)], 0, &mut listener);
        for frame in 1..4 {
            forest.measure(&model, &[], frame, &mut listener);
        }

        // Walk every surviving leaf and compare its skip counter to the
        // number of skip edges on its path.
        for global in &forest.globals {
            for &(_, leaf) in &global.leaves {
                let path = forest.arena.path_from_root(leaf);
                let skip_edges = path
                    .iter()
                    .filter(|&&id| {
                        matches!(forest.arena.get(id).unwrap().kind, BranchKind::Skip)
                    })
                    .count() as u32;
                let node = forest.arena.get(leaf).unwrap();
                if !node.kind.is_end() {
                    assert_eq!(node.state.times_skipped(), skip_edges);
                }
            }
        }
    }

    #[test]
    fn test_isolated_implausible_report_is_clutter() {
        let mut config = test_config();
        config.start_likelihood = 0.01;
        config.false_alarm_likelihood = 0.5;
        config.min_g_hypo_ratio = 0.01;
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(3, 0.01, 50);
        let mut listener = RecordingListener::default();

        forest.measure(&model, &[report(50.0, 50.0, 0, 0.5)], 0, &mut listener);
        for frame in 1..6 {
            forest.measure(&model, &[], frame, &mut listener);
        }

        assert_eq!(
            listener
                .events
                .iter()
                .filter(|e| e.starts_with("clutter"))
                .count(),
            1
        );
        assert!(!listener.events.iter().any(|e| e.starts_with("start")));
        assert_eq!(forest.num_trees(), 0);
    }

    #[test]
    fn test_report_consumed_at_most_once_per_global() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(4, 1e-9, 100);
        let mut listener = RecordingListener::default();

        // Two close tracks competing for one report.
        forest.measure(
            &model,
            &[report(0.0, 0.0, 0, 0.01), report(0.6, 0.0, 0, 0.01)],
            0,
            &mut listener,
        );
        forest.measure(&model, &[report(0.3, 0.0, 1, 0.01)], 1, &mut listener);

        for global in &forest.globals {
            let mut consumed = BTreeSet::new();
            for &(_, leaf) in &global.leaves {
                let node = forest.arena.get(leaf).unwrap();
                if let BranchKind::Detect { report } = node.kind {
                    if node.frame == 1 {
                        // The single frame-1 report: at most one detect leaf
                        // may reference it.
                        assert!(
                            consumed.insert((report.frame, report.x.to_bits())),
                            "report consumed twice in one global"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_global_cap_respected() {
        let config = test_config();
        let model = ObjectModel::new(&config);
        let mut forest = HypothesisForest::new(4, 1e-12, 3);
        let mut listener = RecordingListener::default();

        let reports: Vec<_> = (0..4)
            .map(|i| report(i as f64 * 0.4, 0.0, 0, 0.1))
            .collect();
        forest.measure(&model, &reports, 0, &mut listener);

        assert!(forest.num_globals() <= 3);
    }
}
