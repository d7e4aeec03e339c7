use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::landmarks::{BodyPart, LandmarkSet, POSE_CONNECTIONS};
use crate::posture::Feedback;

const CONNECTION_COLOR: Rgb<u8> = Rgb([66, 117, 245]);
const ISSUE_TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ISSUE_TEXT_ORIGIN: (i32, i32) = (10, 30);
const DEFAULT_FONT_SIZE: f32 = 20.0;

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    pub color: Rgb<u8>,
    pub radius: i32,
    pub thickness: i32,
}

pub const CORRECT_MARKER: MarkerStyle = MarkerStyle {
    color: Rgb([0, 255, 0]),
    radius: 2,
    thickness: 2,
};

pub const INCORRECT_MARKER: MarkerStyle = MarkerStyle {
    color: Rgb([255, 0, 0]),
    radius: 3,
    thickness: 3,
};

/// Whether a landmark should be drawn as correctly placed.
///
/// Matching is by body-part name, so both knees light up when the (left-side)
/// knee check passes, and shoulders and hips both follow "Back position".
pub fn is_marked_correct(part: BodyPart, feedback: &Feedback) -> bool {
    let name = part.name().to_lowercase();
    (name.contains("knee") && feedback.is_correct("Knee bend"))
        || (name.contains("elbow") && feedback.is_correct("Elbow position"))
        || (name.contains("shoulder") && feedback.is_correct("Back position"))
        || (name.contains("hip") && feedback.is_correct("Back position"))
}

pub fn issues_banner(feedback: &Feedback) -> Option<String> {
    feedback
        .has_issues()
        .then(|| format!("Issues: {}", feedback.issues.join(", ")))
}

pub struct FrameAnnotator {
    font: Option<FontArc>,
    font_scale: PxScale,
}

impl FrameAnnotator {
    /// Uses the bundled DejaVu Sans for the issues banner.
    pub fn new() -> Self {
        Self::with_bundled_font(DEFAULT_FONT_SIZE)
    }

    pub fn with_bundled_font(size: f32) -> Self {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|err| warn!(%err, "bundled font unreadable, banner disabled"))
            .ok();
        Self {
            font,
            font_scale: PxScale::from(size),
        }
    }

    pub fn with_font_file(path: &Path, size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|err| Error::Font(format!("{}: {err}", path.display())))?;
        Ok(Self {
            font: Some(font),
            font_scale: PxScale::from(size),
        })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(&self, frame: &mut RgbImage, landmarks: &LandmarkSet, feedback: &Feedback) {
        let (width, height) = (frame.width() as f32, frame.height() as f32);
        let to_pixels = |part: BodyPart| {
            let lm = &landmarks[part];
            (lm.x * width, lm.y * height)
        };

        for (from, to) in POSE_CONNECTIONS {
            draw_line_segment_mut(frame, to_pixels(from), to_pixels(to), CONNECTION_COLOR);
        }

        for (part, _) in landmarks.iter() {
            let style = if is_marked_correct(part, feedback) {
                CORRECT_MARKER
            } else {
                INCORRECT_MARKER
            };
            let (x, y) = to_pixels(part);
            draw_marker(frame, (x as i32, y as i32), style);
        }

        if let Some(text) = issues_banner(feedback) {
            match &self.font {
                Some(font) => {
                    let (x, y) = ISSUE_TEXT_ORIGIN;
                    draw_text_mut(frame, ISSUE_TEXT_COLOR, x, y, self.font_scale, font, &text);
                }
                None => debug!(%text, "no overlay font loaded, skipping banner"),
            }
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_marker(frame: &mut RgbImage, center: (i32, i32), style: MarkerStyle) {
    for ring in 0..style.thickness {
        draw_hollow_circle_mut(frame, center, style.radius + ring, style.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    fn feedback(issues: &[&str], correct: &[&str]) -> Feedback {
        Feedback {
            issues: issues.iter().map(|s| s.to_string()).collect(),
            correct: correct.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn knee_marking_covers_both_sides() {
        let fb = feedback(&["Back leaning too far forward"], &["Knee bend"]);
        assert!(is_marked_correct(BodyPart::LeftKnee, &fb));
        assert!(is_marked_correct(BodyPart::RightKnee, &fb));
        assert!(!is_marked_correct(BodyPart::LeftHip, &fb));
        assert!(!is_marked_correct(BodyPart::LeftShoulder, &fb));
        assert!(!is_marked_correct(BodyPart::Nose, &fb));
    }

    #[test]
    fn back_position_marks_shoulders_and_hips() {
        let fb = feedback(&["Elbows too wide"], &["Back position"]);
        for part in [
            BodyPart::LeftShoulder,
            BodyPart::RightShoulder,
            BodyPart::LeftHip,
            BodyPart::RightHip,
        ] {
            assert!(is_marked_correct(part, &fb), "{part:?}");
        }
        assert!(!is_marked_correct(BodyPart::LeftElbow, &fb));
        assert!(!is_marked_correct(BodyPart::LeftAnkle, &fb));
    }

    #[test]
    fn banner_lists_issues_in_order() {
        let fb = feedback(&["Knees not bent enough", "Back leaning too far forward"], &[]);
        assert_eq!(
            issues_banner(&fb).as_deref(),
            Some("Issues: Knees not bent enough, Back leaning too far forward")
        );
        assert_eq!(issues_banner(&feedback(&[], &["Knee bend"])), None);
    }

    #[test]
    fn markers_use_feedback_colors() {
        let mut set = LandmarkSet::default();
        for part in BodyPart::ALL {
            set[part] = Landmark::new(0.05, 0.05, 1.0);
        }
        set[BodyPart::LeftKnee] = Landmark::new(0.25, 0.5, 1.0);
        set[BodyPart::LeftElbow] = Landmark::new(0.75, 0.5, 1.0);

        let fb = feedback(&[], &["Knee bend"]);
        let mut frame = RgbImage::new(100, 100);
        FrameAnnotator::new().annotate(&mut frame, &set, &fb);

        // Ring pixels sit `radius` to the right of the landmark centre.
        assert_eq!(*frame.get_pixel(25 + 2, 50), CORRECT_MARKER.color);
        assert_eq!(*frame.get_pixel(75 + 3, 50), INCORRECT_MARKER.color);
    }

    #[test]
    fn default_annotator_draws_issue_banner() {
        let annotator = FrameAnnotator::new();
        assert!(annotator.has_font());

        let fb = feedback(&["Knees not bent enough"], &[]);
        let mut frame = RgbImage::new(320, 80);
        annotator.annotate(&mut frame, &LandmarkSet::default(), &fb);

        let banner_pixels = (12..300)
            .flat_map(|x| (28..60).map(move |y| (x, y)))
            .filter(|&(x, y)| {
                let px = frame.get_pixel(x, y);
                px[0] > 128 && px[1] < 64 && px[2] < 64
            })
            .count();
        assert!(banner_pixels > 50, "only {banner_pixels} red banner pixels");
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let result = FrameAnnotator::with_font_file(Path::new("/nonexistent/font.ttf"), 20.0);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
