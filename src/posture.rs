use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{angle, Point};
use crate::landmarks::{BodyPart, LandmarkSet};

/// The rule set applied to each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exercise {
    #[default]
    Squats,
    Pushups,
}

impl Exercise {
    pub const ALL: [Exercise; 2] = [Exercise::Squats, Exercise::Pushups];

    pub const fn name(self) -> &'static str {
        match self {
            Exercise::Squats => "squats",
            Exercise::Pushups => "pushups",
        }
    }

    /// Parses a client-supplied exercise name. Anything that is not exactly
    /// `pushups` selects squats.
    pub fn from_name(name: &str) -> Self {
        match name {
            "pushups" => Exercise::Pushups,
            _ => Exercise::Squats,
        }
    }

    pub fn checks(self) -> &'static [JointCheck] {
        match self {
            Exercise::Squats => &SQUAT_CHECKS,
            Exercise::Pushups => &PUSHUP_CHECKS,
        }
    }

    pub fn evaluate(self, landmarks: &LandmarkSet) -> Feedback {
        let mut feedback = Feedback::default();
        for check in self.checks() {
            match check.evaluate(landmarks) {
                Verdict::Issue(label) => feedback.issues.push(label.to_string()),
                Verdict::Correct(label) => feedback.correct.push(label.to_string()),
            }
        }
        feedback
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub issues: Vec<String>,
    pub correct: Vec<String>,
}

impl Feedback {
    pub fn is_correct(&self, label: &str) -> bool {
        self.correct.iter().any(|c| c == label)
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Issue(&'static str),
    Correct(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Above(f64),
    Below(f64),
}

impl Bound {
    pub fn matches(self, degrees: f64) -> bool {
        match self {
            Bound::Above(limit) => degrees > limit,
            Bound::Below(limit) => degrees < limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub bound: Bound,
    pub issue: &'static str,
}

impl Rule {
    pub const fn above(limit: f64, issue: &'static str) -> Self {
        Self {
            bound: Bound::Above(limit),
            issue,
        }
    }

    pub const fn below(limit: f64, issue: &'static str) -> Self {
        Self {
            bound: Bound::Below(limit),
            issue,
        }
    }
}

/// One classified attribute of an exercise.
///
/// Rules are tried in order and the first matching bound reports its issue.
/// When none match, `otherwise` goes to [`Feedback::correct`].
pub struct JointCheck {
    pub joint: &'static str,
    measure: fn(&LandmarkSet) -> f64,
    rules: &'static [Rule],
    otherwise: &'static str,
}

impl JointCheck {
    pub fn measure(&self, landmarks: &LandmarkSet) -> f64 {
        (self.measure)(landmarks)
    }

    pub fn classify(&self, degrees: f64) -> Verdict {
        self.rules
            .iter()
            .find(|rule| rule.bound.matches(degrees))
            .map_or(Verdict::Correct(self.otherwise), |rule| {
                Verdict::Issue(rule.issue)
            })
    }

    pub fn evaluate(&self, landmarks: &LandmarkSet) -> Verdict {
        self.classify(self.measure(landmarks))
    }

    /// Every label this check can produce, issues first.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        self.rules
            .iter()
            .map(|rule| rule.issue)
            .chain(std::iter::once(self.otherwise))
    }
}

impl fmt::Debug for JointCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JointCheck")
            .field("joint", &self.joint)
            .field("rules", &self.rules)
            .field("otherwise", &self.otherwise)
            .finish()
    }
}

static SQUAT_CHECKS: [JointCheck; 2] = [
    JointCheck {
        joint: "knee",
        measure: squat_knee_angle,
        rules: &[
            Rule::above(160.0, "Knees not bent enough"),
            Rule::below(90.0, "Knees bent too much"),
        ],
        otherwise: "Knee bend",
    },
    JointCheck {
        joint: "torso",
        measure: squat_torso_angle,
        rules: &[Rule::below(70.0, "Back leaning too far forward")],
        otherwise: "Back position",
    },
];

static PUSHUP_CHECKS: [JointCheck; 2] = [
    JointCheck {
        joint: "elbow",
        measure: pushup_elbow_angle,
        rules: &[
            Rule::above(120.0, "Elbows too wide"),
            Rule::below(60.0, "Elbows too close"),
        ],
        otherwise: "Elbow position",
    },
    JointCheck {
        joint: "torso",
        measure: pushup_torso_angle,
        rules: &[Rule::below(160.0, "Back not straight")],
        otherwise: "Back position",
    },
];

fn squat_knee_angle(set: &LandmarkSet) -> f64 {
    angle(
        set.point(BodyPart::LeftHip),
        set.point(BodyPart::LeftKnee),
        set.point(BodyPart::LeftAnkle),
    )
}

/// Lean of the torso, measured at the shoulder against a vertical line
/// dropped to hip height.
fn squat_torso_angle(set: &LandmarkSet) -> f64 {
    let hip = set.point(BodyPart::LeftHip);
    let shoulder = set.point(BodyPart::LeftShoulder);
    angle(hip, shoulder, Point::new(shoulder.x, hip.y))
}

fn pushup_elbow_angle(set: &LandmarkSet) -> f64 {
    angle(
        set.point(BodyPart::LeftShoulder),
        set.point(BodyPart::LeftElbow),
        set.point(BodyPart::LeftWrist),
    )
}

fn pushup_torso_angle(set: &LandmarkSet) -> f64 {
    let shoulder = set.point(BodyPart::LeftShoulder);
    let hip = set.point(BodyPart::LeftHip);
    angle(shoulder, hip, Point::new(hip.x, shoulder.y))
}
