use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use form_sentinel::camera::{FrameSource, SyntheticSource};
use form_sentinel::inference::ScriptedPose;
use form_sentinel::overlay::FrameAnnotator;
use form_sentinel::server;
use form_sentinel::StreamSession;

fn synthetic_session() -> StreamSession {
    StreamSession::new(
        Box::new(|| Ok(Box::new(SyntheticSource::new(64, 48, 200)) as Box<dyn FrameSource>)),
        Box::new(ScriptedPose::new(40)),
        FrameAnnotator::new(),
        70,
    )
}

async fn send(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn set_exercise(app: &Router, body: &'static str) -> String {
    let (status, json) = send(app, "POST", "/set_exercise", Body::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    json["message"].as_str().unwrap().to_string()
}

async fn wait_for_frames(session: &StreamSession, count: u64) {
    for _ in 0..500 {
        if session.frames_processed() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("capture loop produced {} frames", session.frames_processed());
}

#[tokio::test]
async fn feedback_starts_empty() {
    let app = server::router(synthetic_session());
    let (status, json) = send(&app, "GET", "/get_feedback", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "issues": [], "correct": [] }));
}

#[tokio::test]
async fn set_exercise_falls_back_to_squats() {
    let session = synthetic_session();
    let app = server::router(session.clone());

    assert_eq!(
        set_exercise(&app, r#"{"exercise": "pushups"}"#).await,
        "Exercise set to pushups"
    );
    assert_eq!(session.exercise(), form_sentinel::Exercise::Pushups);

    assert_eq!(
        set_exercise(&app, r#"{"exercise": "lunges"}"#).await,
        "Exercise set to squats"
    );
    set_exercise(&app, r#"{"exercise": "pushups"}"#).await;
    assert_eq!(set_exercise(&app, r#"{}"#).await, "Exercise set to squats");
    set_exercise(&app, r#"{"exercise": "pushups"}"#).await;
    assert_eq!(set_exercise(&app, "not json").await, "Exercise set to squats");
    set_exercise(&app, r#"{"exercise": "pushups"}"#).await;
    assert_eq!(
        set_exercise(&app, r#"{"exercise": 7}"#).await,
        "Exercise set to squats"
    );
    assert_eq!(session.exercise(), form_sentinel::Exercise::Squats);
}

#[tokio::test]
async fn stream_lifecycle() {
    let session = synthetic_session();
    let app = server::router(session.clone());

    let (_, json) = send(&app, "POST", "/start_stream", Body::empty()).await;
    assert_eq!(json["message"], "Stream started");
    let (_, json) = send(&app, "POST", "/start_stream", Body::empty()).await;
    assert_eq!(json["message"], "Stream is already running");

    wait_for_frames(&session, 3).await;

    let (_, health) = send(&app, "GET", "/health", Body::empty()).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["streaming"], true);
    assert_eq!(health["exercise"], "squats");
    assert!(health["frames_processed"].as_u64().unwrap() >= 3);

    let (_, feedback) = send(&app, "GET", "/get_feedback", Body::empty()).await;
    let classified = feedback["issues"].as_array().unwrap().len()
        + feedback["correct"].as_array().unwrap().len();
    assert_eq!(classified, 2, "{feedback}");

    let (_, json) = send(&app, "POST", "/stop_stream", Body::empty()).await;
    assert_eq!(json["message"], "Stream stopped");
    assert!(!session.is_streaming());

    let (_, json) = send(&app, "POST", "/start_stream", Body::empty()).await;
    assert_eq!(json["message"], "Stream started");
    send(&app, "POST", "/stop_stream", Body::empty()).await;
}

#[tokio::test]
async fn stop_without_start_is_harmless() {
    let app = server::router(synthetic_session());
    let (status, json) = send(&app, "POST", "/stop_stream", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Stream stopped");
}

#[tokio::test]
async fn video_feed_streams_jpeg_parts() {
    let session = synthetic_session();
    let app = server::router(session.clone());
    send(&app, "POST", "/start_stream", Body::empty()).await;
    wait_for_frames(&session, 1).await;

    let response = app
        .clone()
        .oneshot(Request::get("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut body = response.into_body();
    for _ in 0..2 {
        let part = body
            .frame()
            .await
            .expect("stream stays open")
            .unwrap()
            .into_data()
            .unwrap();
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(part.starts_with(header));
        assert_eq!(&part[header.len()..header.len() + 2], &[0xFF, 0xD8]);
        assert!(part.ends_with(b"\r\n"));
    }

    send(&app, "POST", "/stop_stream", Body::empty()).await;
}
