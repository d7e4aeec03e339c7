use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::camera::{FrameSource, SyntheticSource};
use crate::config::{Config, SourceKind};
use crate::error::{Error, Result};
use crate::inference::{PoseEstimator, ScriptedPose};
use crate::overlay::FrameAnnotator;
use crate::posture::{Exercise, Feedback};

/// How long `stop` waits for the worker to release the frame source.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Opens a fresh frame source on the worker thread for each session.
pub type SourceFactory = Box<dyn Fn() -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// The worker thread is the only writer of the latest frame and feedback.
/// Frames are latest-wins: slow readers miss frames.
#[derive(Clone)]
pub struct StreamSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    streaming: AtomicBool,
    /// Bumped on every start; a worker from an older generation exits quietly.
    generation: AtomicU64,
    exercise: RwLock<Exercise>,
    feedback: RwLock<Feedback>,
    frames: watch::Sender<Option<Bytes>>,
    frames_processed: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    open_source: SourceFactory,
    estimator: Mutex<Box<dyn PoseEstimator>>,
    annotator: FrameAnnotator,
    jpeg_quality: u8,
}

impl StreamSession {
    pub fn new(
        open_source: SourceFactory,
        estimator: Box<dyn PoseEstimator>,
        annotator: FrameAnnotator,
        jpeg_quality: u8,
    ) -> Self {
        let (frames, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                streaming: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                exercise: RwLock::new(Exercise::default()),
                feedback: RwLock::new(Feedback::default()),
                frames,
                frames_processed: AtomicU64::new(0),
                worker: Mutex::new(None),
                open_source,
                estimator: Mutex::new(estimator),
                annotator,
                jpeg_quality: jpeg_quality.clamp(1, 100),
            }),
        }
    }

    /// Builds the source, estimator and annotator named by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let annotator = match &config.overlay.font_path {
            Some(path) => FrameAnnotator::with_font_file(path, config.overlay.font_size)?,
            None => FrameAnnotator::with_bundled_font(config.overlay.font_size),
        };

        let camera = &config.camera;
        let open_source: SourceFactory;
        let estimator: Box<dyn PoseEstimator>;
        match camera.source {
            SourceKind::Synthetic => {
                let (width, height, fps) = (camera.width, camera.height, camera.fps);
                open_source = Box::new(move || {
                    Ok(Box::new(SyntheticSource::new(width, height, fps)) as Box<dyn FrameSource>)
                });
                estimator = Box::new(ScriptedPose::new(u64::from(fps.max(1)) * 3));
            }
            #[cfg(feature = "vision")]
            SourceKind::Camera => {
                let (device_id, width, height) = (camera.device_id, camera.width, camera.height);
                open_source = Box::new(move || {
                    Ok(Box::new(crate::camera::Camera::new(device_id, width, height)?)
                        as Box<dyn FrameSource>)
                });
                estimator = Box::new(crate::inference::PoseDetector::new(&config.model)?);
            }
            #[cfg(not(feature = "vision"))]
            SourceKind::Camera => return Err(Error::BackendUnavailable("camera capture")),
        }

        info!(source = ?config.camera.source, font = annotator.has_font(), "stream session ready");
        Ok(Self::new(open_source, estimator, annotator, config.stream.jpeg_quality))
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::Acquire)
    }

    pub fn exercise(&self) -> Exercise {
        *self.inner.exercise.read()
    }

    pub fn set_exercise(&self, exercise: Exercise) {
        *self.inner.exercise.write() = exercise;
        info!(%exercise, "exercise selected");
    }

    pub fn feedback(&self) -> Feedback {
        self.inner.feedback.read().clone()
    }

    pub fn frames_processed(&self) -> u64 {
        self.inner.frames_processed.load(Ordering::Relaxed)
    }

    pub fn latest_frame(&self) -> Option<Bytes> {
        self.inner.frames.borrow().clone()
    }

    /// A receiver notified whenever a new JPEG frame is published.
    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Bytes>> {
        self.inner.frames.subscribe()
    }

    /// Starts the capture loop unless it is already running.
    pub fn start(&self) -> StartOutcome {
        let mut worker = self.inner.worker.lock();
        if self.is_streaming() {
            return StartOutcome::AlreadyRunning;
        }
        if let Some(previous) = worker.take() {
            reap_worker(previous);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.streaming.store(true, Ordering::Release);
        let session = self.clone();
        let spawned = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || session.run_capture_loop(generation));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!(generation, "stream started");
            }
            Err(err) => {
                self.inner.streaming.store(false, Ordering::Release);
                error!(%err, "failed to spawn capture thread");
            }
        }
        StartOutcome::Started
    }

    /// Clears the streaming flag and gives the worker a short grace period to
    /// release the frame source. A worker stuck in a device read is detached
    /// and exits once the read returns.
    pub fn stop(&self) {
        let handle = {
            let mut worker = self.inner.worker.lock();
            self.inner.streaming.store(false, Ordering::Release);
            worker.take()
        };
        let Some(handle) = handle else {
            return;
        };

        let deadline = Instant::now() + STOP_GRACE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("capture thread blocked on the frame source, detaching it");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        join_worker(handle);
        info!("stream stopped");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_streaming() && self.inner.generation.load(Ordering::Acquire) == generation
    }

    /// Clears the flag unless a newer session has started meanwhile.
    fn finish(&self, generation: u64) {
        let _worker = self.inner.worker.lock();
        if self.inner.generation.load(Ordering::Acquire) == generation {
            self.inner.streaming.store(false, Ordering::Release);
        }
    }

    fn run_capture_loop(self, generation: u64) {
        let mut source = match (self.inner.open_source)() {
            Ok(source) => source,
            Err(err) => {
                error!(%err, "failed to open frame source");
                self.finish(generation);
                return;
            }
        };

        while self.is_current(generation) {
            let mut frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("frame source reached end of stream");
                    break;
                }
                Err(err) => {
                    error!(%err, "frame source failed");
                    break;
                }
            };
            if !self.is_current(generation) {
                break;
            }

            let detection = self.inner.estimator.lock().estimate(&frame);
            match detection {
                Ok(Some(landmarks)) => {
                    let feedback = self.exercise().evaluate(&landmarks);
                    self.inner
                        .annotator
                        .annotate(&mut frame, &landmarks, &feedback);
                    *self.inner.feedback.write() = feedback;
                }
                Ok(None) => debug!("no person detected"),
                Err(err) => warn!(%err, "pose estimation failed, skipping frame"),
            }

            match encode_jpeg(&frame, self.inner.jpeg_quality) {
                Ok(jpeg) => {
                    self.inner.frames.send_replace(Some(jpeg));
                }
                Err(err) => warn!(%err, "failed to encode frame"),
            }
            self.inner.frames_processed.fetch_add(1, Ordering::Relaxed);
        }

        drop(source);
        self.finish(generation);
        debug!(generation, "capture loop exited");
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("capture thread panicked");
    }
}

/// Joins a worker that has already exited; one still blocked in a read is
/// left detached.
fn reap_worker(handle: JoinHandle<()>) {
    if handle.is_finished() {
        join_worker(handle);
    }
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Bytes> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(frame)
        .map_err(Error::from)?;
    Ok(Bytes::from(buf.into_inner()))
}
