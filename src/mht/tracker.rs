//! Multi-object tracker facade.
//!
//! Drives the hypothesis forest one frame at a time through the
//! `predict` / `update` contract. The core is single-threaded and
//! non-reentrant; one tracker instance owns its forest, registry, and
//! false-alarm log. Independent instances share nothing.

use crate::mht::config::TrackerConfig;
use crate::mht::errors::ConfigError;
use crate::mht::forest::HypothesisForest;
use crate::mht::model::ObjectModel;
use crate::mht::object::{Object, ObjectReport};
use crate::mht::registry::{FalseAlarm, Track, TrackRegistry};

/// Multi-hypothesis tracker over per-frame object observations.
#[derive(Debug)]
pub struct MultiObjectTracker {
    model: ObjectModel,
    forest: HypothesisForest,
    registry: TrackRegistry,
    false_alarm_log_likelihood: f64,
    frame: u32,
}

impl MultiObjectTracker {
    /// Validate `config` and build a tracker. A rejected configuration is
    /// fatal: no tracker instance is produced.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = ObjectModel::new(&config);
        let forest = HypothesisForest::new(
            config.max_depth,
            config.min_g_hypo_ratio,
            config.max_g_hypos,
        );
        Ok(Self {
            model,
            forest,
            registry: TrackRegistry::new(),
            false_alarm_log_likelihood: config.false_alarm_likelihood.ln(),
            frame: 0,
        })
    }

    /// Advance every hypothesis branch by one Δt without consuming reports.
    ///
    /// Calling twice advances twice. A subsequent [`update`] does not step
    /// the already-advanced branches a second time, so `predict()` followed
    /// by `update(&[])` advances exactly one Δt in total.
    ///
    /// [`update`]: MultiObjectTracker::update
    pub fn predict(&mut self) {
        self.forest.predict_leaves();
    }

    /// Feed one frame of observations and return the current confirmed
    /// tracks.
    ///
    /// The returned snapshot reflects the best global hypothesis committed
    /// at this frame's N-scan horizon; it may lag new observations by up to
    /// `max_depth` frames. Malformed corner observations are diverted to
    /// the false-alarm log and reported once per frame.
    pub fn update(&mut self, measurements: &[Object]) -> &[Track] {
        self.registry.evict_closed();

        let mut rejected = 0usize;
        let mut reports = Vec::with_capacity(measurements.len());
        for object in measurements {
            match object.validate() {
                Ok(()) => reports.push(ObjectReport::new(
                    object.clone(),
                    self.frame,
                    self.false_alarm_log_likelihood,
                )),
                Err(_) => {
                    rejected += 1;
                    self.registry.record_false_alarm(FalseAlarm {
                        x: object.reference_point.x,
                        y: object.reference_point.y,
                        frame: self.frame,
                        corner_id: object.corner_id,
                    });
                }
            }
        }
        if rejected > 0 {
            tracing::warn!(
                frame = self.frame,
                rejected,
                "corner observations without source segments treated as false alarms"
            );
        }

        self.forest
            .measure(&self.model, &reports, self.frame, &mut self.registry);
        self.frame += 1;
        self.registry.tracks()
    }

    /// Current confirmed track snapshot
    pub fn tracks(&self) -> &[Track] {
        self.registry.tracks()
    }

    /// Append-only false-alarm log
    pub fn false_alarms(&self) -> &[FalseAlarm] {
        self.registry.false_alarms()
    }

    /// Next frame number to be assigned by [`update`]
    ///
    /// [`update`]: MultiObjectTracker::update
    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Number of surviving global hypotheses
    #[inline]
    pub fn num_global_hypotheses(&self) -> usize {
        self.forest.num_globals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mht::object::{ReferencePointSource, ReferencePointType};
    use nalgebra::{Matrix4, Vector2};
    use smallvec::SmallVec;

    fn centroid(x: f64, y: f64) -> Object {
        Object::new(
            Vector2::new(x, y),
            ReferencePointType::Centroid,
            SmallVec::new(),
            0,
        )
    }

    #[test]
    fn test_invalid_configuration_is_fatal() {
        let config = TrackerConfig {
            process_noise_covariance: Matrix4::zeros(),
            ..TrackerConfig::default()
        };
        assert!(MultiObjectTracker::new(config).is_err());
    }

    #[test]
    fn test_frame_counter_increments_per_update() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();
        assert_eq!(tracker.frame(), 0);
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.frame(), 2);
    }

    #[test]
    fn test_rejected_corner_object_becomes_false_alarm() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default()).unwrap();

        let malformed = Object::new(
            Vector2::new(3.0, -2.0),
            ReferencePointType::Corner,
            ReferencePointSource::new(),
            1,
        );
        tracker.update(&[malformed]);

        assert_eq!(tracker.false_alarms().len(), 1);
        let alarm = &tracker.false_alarms()[0];
        assert!((alarm.x - 3.0).abs() < 1e-12);
        assert!((alarm.y + 2.0).abs() < 1e-12);
        assert_eq!(alarm.corner_id, 1);
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_single_target_confirms_one_track() {
        let config = TrackerConfig {
            start_likelihood: 0.4,
            false_alarm_likelihood: 0.01,
            max_depth: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = MultiObjectTracker::new(config).unwrap();

        for _ in 0..5 {
            tracker.update(&[centroid(1.0, 0.0)]);
        }

        assert_eq!(tracker.tracks().len(), 1);
        let track = &tracker.tracks()[0];
        assert_eq!(track.id, 0);
        assert!(!track.samples.is_empty());
    }

    #[test]
    fn test_predict_then_empty_update_matches_plain_empty_update() {
        let config = TrackerConfig {
            start_likelihood: 0.4,
            max_depth: 1,
            ..TrackerConfig::default()
        };
        let mut with_predict = MultiObjectTracker::new(config.clone()).unwrap();
        let mut plain = MultiObjectTracker::new(config).unwrap();

        for tracker in [&mut with_predict, &mut plain] {
            tracker.update(&[centroid(0.0, 0.0)]);
            tracker.update(&[centroid(0.1, 0.0)]);
        }

        with_predict.predict();
        with_predict.update(&[]);
        plain.update(&[]);

        for tracker in [&mut with_predict, &mut plain] {
            tracker.update(&[]);
        }

        let a: Vec<_> = with_predict.tracks().iter().flat_map(|t| &t.samples).collect();
        let b: Vec<_> = plain.tracks().iter().flat_map(|t| &t.samples).collect();
        assert_eq!(a, b);
    }
}
