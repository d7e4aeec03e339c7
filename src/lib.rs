//! Exercise-form feedback over a webcam stream.
//!
//! Pose landmarks come from an external model; this crate measures joint
//! angles, classifies squat and push-up form against fixed thresholds, draws
//! the result onto each frame and serves it over HTTP.

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod landmarks;
pub mod overlay;
pub mod posture;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use posture::{Exercise, Feedback};
pub use session::StreamSession;
