use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use crate::error::Result;

/// A lazy, unbounded sequence of frames.
///
/// `Ok(None)` marks the end of the stream; an error means the device failed.
/// Either one ends the current capture session.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Plain frames at a fixed rate, for running without a webcam.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    interval: Duration,
    last: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs(1) / fps.max(1),
            last: None,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
        Ok(Some(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([32, 32, 32]),
        )))
    }
}

#[cfg(feature = "vision")]
pub use self::webcam::Camera;

#[cfg(feature = "vision")]
mod webcam {
    use image::RgbImage;
    use opencv::{
        core::Mat,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use tracing::info;

    use super::FrameSource;
    use crate::error::{Error, Result};

    pub struct Camera {
        capture: VideoCapture,
    }

    impl Camera {
        pub fn new(device_id: i32, width: u32, height: u32) -> Result<Self> {
            let mut capture = VideoCapture::new(device_id, videoio::CAP_ANY)?;

            if !capture.is_opened()? {
                return Err(Error::Capture(format!("failed to open camera {device_id}")));
            }

            capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?;
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
            info!(device_id, width, height, "camera opened");

            Ok(Self { capture })
        }
    }

    impl FrameSource for Camera {
        fn read_frame(&mut self) -> Result<Option<RgbImage>> {
            let mut frame = Mat::default();
            if !self.capture.read(&mut frame)? || frame.empty() {
                return Ok(None);
            }
            bgr_to_rgb(&frame).map(Some)
        }
    }

    impl Drop for Camera {
        fn drop(&mut self) {
            if let Err(err) = self.capture.release() {
                tracing::warn!(%err, "failed to release camera");
            }
        }
    }

    fn bgr_to_rgb(frame: &Mat) -> Result<RgbImage> {
        if frame.channels() != 3 {
            return Err(Error::Capture(format!(
                "expected a 3-channel frame, got {}",
                frame.channels()
            )));
        }
        let continuous;
        let mat = if frame.is_continuous() {
            frame
        } else {
            continuous = frame.try_clone()?;
            &continuous
        };

        let (width, height) = (mat.cols() as u32, mat.rows() as u32);
        let bgr = mat.data_bytes()?;
        let mut rgb = Vec::with_capacity(bgr.len());
        for px in bgr.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| Error::Capture("frame buffer size mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_have_configured_size() {
        let mut source = SyntheticSource::new(64, 48, 1000);
        for _ in 0..3 {
            let frame = source.read_frame().unwrap().expect("synthetic source never ends");
            assert_eq!(frame.dimensions(), (64, 48));
        }
    }

    #[test]
    fn synthetic_source_is_paced() {
        let mut source = SyntheticSource::new(8, 8, 50);
        let start = Instant::now();
        for _ in 0..3 {
            source.read_frame().unwrap();
        }
        // Two waits of 20ms between three frames.
        assert!(start.elapsed() >= Duration::from_millis(38));
    }
}
