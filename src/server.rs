//! HTTP surface.
//!
//! - `GET  /video_feed`   - MJPEG stream of annotated frames
//! - `POST /start_stream` - start the capture loop
//! - `POST /stop_stream`  - stop it and release the camera
//! - `POST /set_exercise` - `{"exercise": "squats" | "pushups"}`
//! - `GET  /get_feedback` - `{"issues": [...], "correct": [...]}`
//! - `GET  /health`       - liveness and stream status

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::posture::{Exercise, Feedback};
use crate::session::{StartOutcome, StreamSession};

pub const MJPEG_BOUNDARY: &str = "frame";

pub fn router(session: StreamSession) -> Router {
    Router::new()
        .route("/video_feed", get(video_feed))
        .route("/start_stream", post(start_stream))
        .route("/stop_stream", post(stop_stream))
        .route("/set_exercise", post(set_exercise))
        .route("/get_feedback", get(get_feedback))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(session)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SetExerciseRequest {
    exercise: Option<String>,
}

/// Failures the client only sees as a generic message.
#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Internal server error" })),
        )
            .into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError(err.to_string())
    }
}

async fn start_stream(State(session): State<StreamSession>) -> Result<Json<Message>, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || session.start()).await?;
    Ok(match outcome {
        StartOutcome::Started => Message::new("Stream started"),
        StartOutcome::AlreadyRunning => Message::new("Stream is already running"),
    })
}

async fn stop_stream(State(session): State<StreamSession>) -> Result<Json<Message>, ApiError> {
    tokio::task::spawn_blocking(move || session.stop()).await?;
    Ok(Message::new("Stream stopped"))
}

/// Malformed bodies, a missing field and unknown names all fall back to squats.
async fn set_exercise(State(session): State<StreamSession>, body: Bytes) -> Json<Message> {
    let exercise = serde_json::from_slice::<SetExerciseRequest>(&body)
        .ok()
        .and_then(|req| req.exercise)
        .map_or(Exercise::default(), |name| Exercise::from_name(&name));

    session.set_exercise(exercise);
    Message::new(format!("Exercise set to {exercise}"))
}

async fn get_feedback(State(session): State<StreamSession>) -> Json<Feedback> {
    Json(session.feedback())
}

async fn health(State(session): State<StreamSession>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "streaming": session.is_streaming(),
        "exercise": session.exercise(),
        "frames_processed": session.frames_processed(),
    }))
}

async fn video_feed(State(session): State<StreamSession>) -> impl IntoResponse {
    info!("video feed client connected");
    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"),
        )],
        Body::from_stream(mjpeg_parts(session.subscribe_frames())),
    )
}

/// One multipart part per published frame; a frame already waiting when the
/// client connects is sent straight away.
pub fn mjpeg_parts(
    frames: watch::Receiver<Option<Bytes>>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold((frames, true), |(mut frames, first)| async move {
        loop {
            if !first || frames.borrow().is_none() {
                frames.changed().await.ok()?;
            }
            let latest = frames.borrow_and_update().clone();
            match latest {
                Some(jpeg) => return Some((Ok(mjpeg_part(&jpeg)), (frames, false))),
                None => continue,
            }
        }
    })
}

pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut part = Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(format!("--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}
