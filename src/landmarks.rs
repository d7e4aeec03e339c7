//! Body landmarks as produced by a BlazePose-style pose model.

use std::ops::{Index, IndexMut};

use crate::geometry::Point;

pub const LANDMARK_COUNT: usize = 33;

/// The 33 BlazePose body parts, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl BodyPart {
    pub const ALL: [BodyPart; LANDMARK_COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEyeInner,
        BodyPart::LeftEye,
        BodyPart::LeftEyeOuter,
        BodyPart::RightEyeInner,
        BodyPart::RightEye,
        BodyPart::RightEyeOuter,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::MouthLeft,
        BodyPart::MouthRight,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftPinky,
        BodyPart::RightPinky,
        BodyPart::LeftIndex,
        BodyPart::RightIndex,
        BodyPart::LeftThumb,
        BodyPart::RightThumb,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
        BodyPart::LeftHeel,
        BodyPart::RightHeel,
        BodyPart::LeftFootIndex,
        BodyPart::RightFootIndex,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Upper snake case name, e.g. `LEFT_KNEE`.
    pub const fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "NOSE",
            BodyPart::LeftEyeInner => "LEFT_EYE_INNER",
            BodyPart::LeftEye => "LEFT_EYE",
            BodyPart::LeftEyeOuter => "LEFT_EYE_OUTER",
            BodyPart::RightEyeInner => "RIGHT_EYE_INNER",
            BodyPart::RightEye => "RIGHT_EYE",
            BodyPart::RightEyeOuter => "RIGHT_EYE_OUTER",
            BodyPart::LeftEar => "LEFT_EAR",
            BodyPart::RightEar => "RIGHT_EAR",
            BodyPart::MouthLeft => "MOUTH_LEFT",
            BodyPart::MouthRight => "MOUTH_RIGHT",
            BodyPart::LeftShoulder => "LEFT_SHOULDER",
            BodyPart::RightShoulder => "RIGHT_SHOULDER",
            BodyPart::LeftElbow => "LEFT_ELBOW",
            BodyPart::RightElbow => "RIGHT_ELBOW",
            BodyPart::LeftWrist => "LEFT_WRIST",
            BodyPart::RightWrist => "RIGHT_WRIST",
            BodyPart::LeftPinky => "LEFT_PINKY",
            BodyPart::RightPinky => "RIGHT_PINKY",
            BodyPart::LeftIndex => "LEFT_INDEX",
            BodyPart::RightIndex => "RIGHT_INDEX",
            BodyPart::LeftThumb => "LEFT_THUMB",
            BodyPart::RightThumb => "RIGHT_THUMB",
            BodyPart::LeftHip => "LEFT_HIP",
            BodyPart::RightHip => "RIGHT_HIP",
            BodyPart::LeftKnee => "LEFT_KNEE",
            BodyPart::RightKnee => "RIGHT_KNEE",
            BodyPart::LeftAnkle => "LEFT_ANKLE",
            BodyPart::RightAnkle => "RIGHT_ANKLE",
            BodyPart::LeftHeel => "LEFT_HEEL",
            BodyPart::RightHeel => "RIGHT_HEEL",
            BodyPart::LeftFootIndex => "LEFT_FOOT_INDEX",
            BodyPart::RightFootIndex => "RIGHT_FOOT_INDEX",
        }
    }
}

/// Skeleton edges drawn between landmarks.
pub const POSE_CONNECTIONS: [(BodyPart, BodyPart); 35] = {
    use BodyPart::*;
    [
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (MouthLeft, MouthRight),
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (RightHip, RightKnee),
        (LeftKnee, LeftAnkle),
        (RightKnee, RightAnkle),
        (LeftAnkle, LeftHeel),
        (RightAnkle, RightHeel),
        (LeftHeel, LeftFootIndex),
        (RightHeel, RightFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// One landmark per body part for a single detected person.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn point(&self, part: BodyPart) -> Point {
        self[part].point()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, &Landmark)> {
        BodyPart::ALL.into_iter().zip(self.landmarks.iter())
    }
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self::new([Landmark::default(); LANDMARK_COUNT])
    }
}

impl Index<BodyPart> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, part: BodyPart) -> &Landmark {
        &self.landmarks[part.index()]
    }
}

impl IndexMut<BodyPart> for LandmarkSet {
    fn index_mut(&mut self, part: BodyPart) -> &mut Landmark {
        &mut self.landmarks[part.index()]
    }
}
