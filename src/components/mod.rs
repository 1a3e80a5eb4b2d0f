//! Reusable estimation components.

pub mod kalman;

pub use kalman::KalmanFilter;
