use std::f64::consts::TAU;

use image::RgbImage;

use crate::error::Result;
use crate::geometry::Point;
use crate::landmarks::{BodyPart, Landmark, LandmarkSet};

/// Finds a single person in a frame.
///
/// Returns `Ok(None)` when nobody is visible; the caller then keeps its
/// previous feedback.
pub trait PoseEstimator: Send {
    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>>;
}

/// A side-view figure that keeps bending its knees and elbows.
///
/// Used with the synthetic frame source so the whole pipeline runs without a
/// camera or a model. One full movement takes `period` frames.
pub struct ScriptedPose {
    tick: u64,
    period: u64,
}

impl ScriptedPose {
    pub fn new(period: u64) -> Self {
        Self {
            tick: 0,
            period: period.max(1),
        }
    }

    pub fn pose_at(&self, tick: u64) -> LandmarkSet {
        let phase = (tick % self.period) as f64 / self.period as f64;
        let swing = 0.5 - 0.5 * (phase * TAU).cos();
        // Knee sweeps 175 -> 60 degrees, elbow 170 -> 40, torso lean 85 -> 55.
        let knee = 175.0 - 115.0 * swing;
        let elbow = 170.0 - 130.0 * swing;
        let lean = 85.0 - 30.0 * swing;

        let ankle = Point::new(0.5, 0.9);
        let knee_at = Point::new(0.5, 0.7);
        let hip = toward(knee_at, 0.2, knee);
        let shoulder = toward(hip, -0.3, lean);
        let elbow_at = toward(shoulder, 0.15, 0.0);
        let wrist = toward(elbow_at, 0.15, 180.0 - elbow);
        let head = toward(shoulder, -0.1, lean);

        let mut set = LandmarkSet::default();
        let mut put = |parts: &[BodyPart], p: Point| {
            for &part in parts {
                set[part] = Landmark::new(p.x as f32, p.y as f32, 0.99);
            }
        };

        use BodyPart::*;
        put(
            &[
                Nose, LeftEyeInner, LeftEye, LeftEyeOuter, RightEyeInner, RightEye,
                RightEyeOuter, LeftEar, RightEar, MouthLeft, MouthRight,
            ],
            head,
        );
        put(&[LeftShoulder, RightShoulder], shoulder);
        put(&[LeftElbow, RightElbow], elbow_at);
        put(
            &[
                LeftWrist, RightWrist, LeftPinky, RightPinky, LeftIndex, RightIndex,
                LeftThumb, RightThumb,
            ],
            wrist,
        );
        put(&[LeftHip, RightHip], hip);
        put(&[LeftKnee, RightKnee], knee_at);
        put(
            &[
                LeftAnkle, RightAnkle, LeftHeel, RightHeel, LeftFootIndex, RightFootIndex,
            ],
            ankle,
        );
        set
    }
}

impl PoseEstimator for ScriptedPose {
    fn estimate(&mut self, _frame: &RgbImage) -> Result<Option<LandmarkSet>> {
        let set = self.pose_at(self.tick);
        self.tick = self.tick.wrapping_add(1);
        Ok(Some(set))
    }
}

/// `origin` moved by `length` along a direction `degrees` away from straight
/// down (positive y). Negative lengths point the other way.
fn toward(origin: Point, length: f64, degrees: f64) -> Point {
    let r = degrees.to_radians();
    Point::new(
        (origin.x + length * r.sin()).clamp(0.0, 1.0),
        (origin.y + length * r.cos()).clamp(0.0, 1.0),
    )
}

#[cfg(feature = "vision")]
pub use self::onnx::PoseDetector;

#[cfg(feature = "vision")]
mod onnx {
    use image::imageops::{self, FilterType};
    use image::RgbImage;
    use ndarray::{Array4, ArrayViewD};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use tracing::info;

    use super::PoseEstimator;
    use crate::config::ModelConfig;
    use crate::error::{Error, Result};
    use crate::landmarks::{Landmark, LandmarkSet, LANDMARK_COUNT};

    /// Values per landmark in the model output: x, y, z, visibility, presence.
    const VALUES_PER_LANDMARK: usize = 5;

    /// BlazePose-style landmark model run through ONNX Runtime.
    pub struct PoseDetector {
        session: Session,
        input_size: u32,
        input_name: String,
        landmarks_output: String,
        presence_output: String,
        min_detection_confidence: f32,
    }

    impl PoseDetector {
        pub fn new(config: &ModelConfig) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(&config.path)
                .map_err(|err| {
                    Error::Inference(format!("loading {}: {err}", config.path.display()))
                })?;
            info!(path = %config.path.display(), "pose model loaded");

            Ok(Self {
                session,
                input_size: config.input_size,
                input_name: config.input_name.clone(),
                landmarks_output: config.landmarks_output.clone(),
                presence_output: config.presence_output.clone(),
                min_detection_confidence: config.min_detection_confidence,
            })
        }

        fn preprocess(&self, frame: &RgbImage) -> Array4<f32> {
            let size = self.input_size;
            let resized = imageops::resize(frame, size, size, FilterType::Triangle);
            let side = size as usize;
            Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
                f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0
            })
        }
    }

    impl PoseEstimator for PoseDetector {
        fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>> {
            let input = Tensor::from_array(self.preprocess(frame))?;
            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => input])?;

            let presence: ArrayViewD<f32> =
                outputs[self.presence_output.as_str()].try_extract_array()?;
            let score = presence.iter().next().copied().unwrap_or(0.0);
            if score < self.min_detection_confidence {
                return Ok(None);
            }

            let raw: ArrayViewD<f32> =
                outputs[self.landmarks_output.as_str()].try_extract_array()?;
            let values: Vec<f32> = raw.iter().copied().collect();
            if values.len() < LANDMARK_COUNT * VALUES_PER_LANDMARK {
                return Err(Error::Inference(format!(
                    "landmark output has {} values, expected at least {}",
                    values.len(),
                    LANDMARK_COUNT * VALUES_PER_LANDMARK
                )));
            }

            let scale = self.input_size as f32;
            let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
            for (i, landmark) in landmarks.iter_mut().enumerate() {
                let v = &values[i * VALUES_PER_LANDMARK..(i + 1) * VALUES_PER_LANDMARK];
                *landmark = Landmark {
                    x: v[0] / scale,
                    y: v[1] / scale,
                    z: v[2] / scale,
                    visibility: sigmoid(v[3]),
                };
            }
            Ok(Some(LandmarkSet::new(landmarks)))
        }
    }

    fn sigmoid(logit: f32) -> f32 {
        1.0 / (1.0 + (-logit).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::Exercise;

    #[test]
    fn scripted_pose_cycles() {
        let pose = ScriptedPose::new(10);
        assert_eq!(pose.pose_at(3), pose.pose_at(13));
        assert_ne!(pose.pose_at(0), pose.pose_at(5));
    }

    #[test]
    fn scripted_pose_stays_in_frame() {
        let pose = ScriptedPose::new(24);
        for tick in 0..24 {
            for (part, lm) in pose.pose_at(tick).iter() {
                assert!((0.0..=1.0).contains(&lm.x), "{part:?} x={}", lm.x);
                assert!((0.0..=1.0).contains(&lm.y), "{part:?} y={}", lm.y);
            }
        }
    }

    #[test]
    fn scripted_squat_hits_every_knee_verdict() {
        let pose = ScriptedPose::new(40);
        let mut seen = std::collections::HashSet::new();
        for tick in 0..40 {
            let feedback = Exercise::Squats.evaluate(&pose.pose_at(tick));
            seen.extend(feedback.issues);
            seen.extend(feedback.correct);
        }
        for label in ["Knees not bent enough", "Knees bent too much", "Knee bend"] {
            assert!(seen.contains(label), "missing {label}: {seen:?}");
        }
    }

    #[test]
    fn estimator_always_reports_a_person() {
        let mut estimator = ScriptedPose::new(8);
        let frame = RgbImage::new(4, 4);
        let first = estimator.estimate(&frame).unwrap();
        let second = estimator.estimate(&frame).unwrap();
        assert!(first.is_some());
        assert_ne!(first, second);
    }
}
