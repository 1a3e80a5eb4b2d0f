/*!
# laser-mht - Multi-hypothesis tracker for planar laser scans

Consumes per-frame geometric object observations extracted from a planar
laser scan and maintains a set of persistent tracks, each describing a
moving object with position and velocity estimated by a constant-velocity
Kalman filter.

## Modules

- [`mht`] - The tracker core: hypothesis forest, object model, track registry
- [`components`] - Estimation primitives: the fixed-size Kalman filter
- [`common`] - Low-level utilities: segment geometry, covariance checks

## Example

```rust
use laser_mht::{MultiObjectTracker, Object, ReferencePointType, TrackerConfig};
use nalgebra::Vector2;
use smallvec::SmallVec;

let config = TrackerConfig::builder()
    .time_step(0.1)
    .start_likelihood(0.3)
    .max_depth(2)
    .build()
    .unwrap();
let mut tracker = MultiObjectTracker::new(config).unwrap();

for frame in 0..10 {
    let observation = Object::new(
        Vector2::new(0.1 * frame as f64, 0.0),
        ReferencePointType::Centroid,
        SmallVec::new(),
        0,
    );
    let tracks = tracker.update(&[observation]);
    for track in tracks {
        let _ = (track.id, track.samples.len());
    }
}
```
*/

pub mod common;
pub mod components;
pub mod mht;

pub use common::geometry::Segment2D;
pub use components::kalman::KalmanFilter;
pub use mht::{
    ConfigError, FalseAlarm, MultiObjectTracker, Object, ObjectModel, ObjectReport, ObjectState,
    ReferencePointSource, ReferencePointType, Sample, Track, TrackListener, TrackRegistry,
    TrackerConfig, TrackerError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
