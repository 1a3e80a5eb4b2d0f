//! Track registry: consumes engine hooks and owns track histories.
//!
//! The registry subscribes to the [`TrackListener`] hooks of the hypothesis
//! forest and materializes the committed event stream into [`Track`]
//! snapshots and an append-only false-alarm log.

use crate::mht::forest::TrackListener;
use crate::mht::state::ObjectState;
use crate::mht::tree::ReportSummary;

/// One committed sample of a track history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Frame the sample belongs to
    pub frame: u32,
    /// Measured position, `None` for skipped frames
    pub measurement: Option<(f64, f64)>,
    /// Filtered state `(x, y, vx, vy)`
    pub state: (f64, f64, f64, f64),
    /// Branch log-likelihood at this sample
    pub log_likelihood: f64,
}

impl Sample {
    fn from_state(frame: u32, measurement: Option<(f64, f64)>, state: &ObjectState) -> Self {
        Self {
            frame,
            measurement,
            state: (
                state.x(),
                state.y(),
                state.velocity_x(),
                state.velocity_y(),
            ),
            log_likelihood: state.log_likelihood(),
        }
    }
}

/// A confirmed track with stable identity and committed history.
#[derive(Debug, Clone)]
pub struct Track {
    /// Stable identifier, unique and monotonic per tracker instance
    pub id: u64,
    /// Hypothesis tree the track was confirmed from
    pub hypothesis_id: u64,
    /// Committed samples in frame order
    pub samples: Vec<Sample>,
    /// Whether the track has been closed; closed tracks are never reopened
    pub closed: bool,
}

impl Track {
    /// Most recent committed sample
    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// A report committed as clutter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FalseAlarm {
    /// Reference point x, metres
    pub x: f64,
    /// Reference point y, metres
    pub y: f64,
    /// Frame the report arrived in
    pub frame: u32,
    /// Corner index within the source object
    pub corner_id: usize,
}

/// Materializes committed engine events into track snapshots.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    false_alarms: Vec<FalseAlarm>,
}

impl TrackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Current track snapshot: active tracks plus tracks closed since the
    /// previous eviction.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Append-only clutter log
    pub fn false_alarms(&self) -> &[FalseAlarm] {
        &self.false_alarms
    }

    /// Record a clutter observation directly, bypassing the engine. Used
    /// for reports rejected before association.
    pub fn record_false_alarm(&mut self, false_alarm: FalseAlarm) {
        self.false_alarms.push(false_alarm);
    }

    /// Drop tracks that were closed before this call. Closed tracks remain
    /// queryable for exactly one frame.
    pub fn evict_closed(&mut self) {
        self.tracks.retain(|track| !track.closed);
    }

    fn find_track_mut(&mut self, track_id: u64) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|track| track.id == track_id)
    }
}

impl TrackListener for TrackRegistry {
    fn start_track(
        &mut self,
        track_id: u64,
        hypothesis_id: u64,
        state: &ObjectState,
        report: &ReportSummary,
    ) {
        debug_assert!(self.tracks.iter().all(|t| t.id != track_id));
        self.tracks.push(Track {
            id: track_id,
            hypothesis_id,
            samples: vec![Sample::from_state(
                report.frame,
                Some((report.x, report.y)),
                state,
            )],
            closed: false,
        });
    }

    fn continue_track(
        &mut self,
        track_id: u64,
        _hypothesis_id: u64,
        state: &ObjectState,
        report: &ReportSummary,
    ) {
        if let Some(track) = self.find_track_mut(track_id) {
            track
                .samples
                .push(Sample::from_state(report.frame, Some((report.x, report.y)), state));
        }
    }

    fn skip_track(&mut self, track_id: u64, _hypothesis_id: u64, frame: u32, state: &ObjectState) {
        if let Some(track) = self.find_track_mut(track_id) {
            track.samples.push(Sample::from_state(frame, None, state));
        }
    }

    fn end_track(&mut self, track_id: u64, _hypothesis_id: u64) {
        if let Some(track) = self.find_track_mut(track_id) {
            track.closed = true;
        }
    }

    fn false_alarm(&mut self, _hypothesis_id: u64, report: &ReportSummary) {
        self.false_alarms.push(FalseAlarm {
            x: report.x,
            y: report.y,
            frame: report.frame,
            corner_id: report.corner_id,
        });
    }
}
