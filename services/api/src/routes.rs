//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use common::diary::{DeleteOutcome, SortOrder};
use common::mood::{IntensityLevel, MoodLabel};
use common::presentation::{Notice, chart_series};
use common::session::UserSession;
use media::{MediaSample, MoodRequest};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::auth_middleware,
    models::{DiaryQuery, MoodResponse, TipResponse},
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/moods",
            post(upload_mood).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/diary", get(list_diary))
        .route("/diary/chart", get(diary_chart))
        .route("/diary/:id", delete(delete_entry))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/tips/:mood", get(get_tip))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Classify an uploaded photo or video and record the mood.
///
/// Multipart fields: `file` (required) and `intensity` (optional, 1 to 10).
pub async fn upload_mood(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut sample = None;
    let mut intensity = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?
                    .to_vec();

                sample = Some(match (content_type, file_name) {
                    (Some(mime), Some(name)) => MediaSample::new(bytes, mime).with_file_name(name),
                    (Some(mime), None) => MediaSample::new(bytes, mime),
                    (None, Some(name)) => MediaSample::from_file(bytes, name),
                    (None, None) => MediaSample::sniffed(bytes),
                });
            }
            Some("intensity") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                let value: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid intensity: {}", raw)))?;
                intensity = Some(
                    IntensityLevel::try_from(value)
                        .map_err(|e| ApiError::BadRequest(e.to_string()))?,
                );
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let sample = sample.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    let request = MoodRequest::new(session.scope(), sample).with_intensity(intensity);
    let reading = state.pipeline.run(request).await?;

    let tip = state.tips.pick_random(&reading.entry.mood).to_string();
    let notice = Notice::message(format!("Your pet seems {}", reading.entry.mood))
        .dismiss_after(state.notice_dismiss_ms);
    info!("User {} recorded {}", session.id, reading.entry.mood);

    Ok((
        StatusCode::CREATED,
        Json(MoodResponse {
            entry: reading.entry,
            tip,
            notice,
        }),
    ))
}

/// Diary of the current user
pub async fn list_diary(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<DiaryQuery>,
) -> ApiResult<impl IntoResponse> {
    let entries = state
        .pipeline
        .store()
        .list(session.scope(), query.order.unwrap_or_default())
        .await?;

    Ok(Json(entries))
}

/// Mood-over-time series, oldest first
pub async fn diary_chart(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<impl IntoResponse> {
    let entries = state
        .pipeline
        .store()
        .list(session.scope(), SortOrder::Asc)
        .await?;

    Ok(Json(chart_series(&entries)))
}

/// Delete one entry of the current user
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    match state.pipeline.store().delete(session.scope(), id).await? {
        DeleteOutcome::Deleted => Ok(Json(
            Notice::message("Diary entry deleted").dismiss_after(state.notice_dismiss_ms),
        )),
        DeleteOutcome::NotFound => Err(ApiError::NotFound("Diary entry".to_string())),
    }
}

/// A care tip for a mood
pub async fn get_tip(
    State(state): State<AppState>,
    Path(mood): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let mood = MoodLabel::new(mood).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let tip = state.tips.pick_random(&mood).to_string();

    Ok(Json(TipResponse { mood, tip }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::TokenVerifier;
    use crate::middleware::tests::{TEST_PUBLIC_KEY, sign};
    use axum::body::Body;
    use axum::http::{Request, header};
    use common::diary::{DiaryEntry, MemoryDiaryStore};
    use common::mood::LabelSet;
    use common::presentation::TipBook;
    use common::token::TokenType;
    use image::{ImageFormat, Rgb, RgbImage};
    use media::{FfmpegDecoder, FixedStrategy, MoodPipeline, Normalizer};
    use serde_json::Value;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "pawmood-test-boundary";

    fn app() -> Router {
        let pipeline = MoodPipeline::new(
            Normalizer::new(
                224,
                224,
                Duration::from_secs(10),
                Arc::new(FfmpegDecoder::default()),
            ),
            Arc::new(FixedStrategy::new("happy")),
            LabelSet::default(),
            Arc::new(MemoryDiaryStore::new()),
        );

        create_router(AppState {
            pipeline: Arc::new(pipeline),
            tips: Arc::new(TipBook::default()),
            notice_dismiss_ms: 3000,
            verifier: Arc::new(TokenVerifier::new(TEST_PUBLIC_KEY).unwrap()),
            max_upload_bytes: 1024 * 1024,
        })
    }

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(64, 48, Rgb([10, 200, 30]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn multipart_body(file_name: &str, mime: &str, bytes: &[u8], intensity: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
        if let Some(intensity) = intensity {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"intensity\"\r\n\r\n{intensity}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/moods")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(body: Body) -> Value {
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let response = app().oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response.into_body()).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_diary_requires_access_token() {
        let app = app();
        let response = app.clone().oneshot(get_request("/diary", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let refresh = sign(Uuid::new_v4(), TokenType::Refresh, 300);
        let response = app.oneshot(get_request("/diary", Some(&refresh))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_is_recorded_for_token_owner_only() {
        let app = app();
        let alice = sign(Uuid::new_v4(), TokenType::Access, 300);
        let bob = sign(Uuid::new_v4(), TokenType::Access, 300);

        let body = multipart_body("photo.jpg", "image/png", &png_bytes(), Some("8"));
        let response = app.clone().oneshot(upload(&alice, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created = json_body(response.into_body()).await;
        assert_eq!(created["entry"]["mood"], "happy");
        assert_eq!(created["entry"]["intensity"], 8);
        assert!(created["tip"].as_str().is_some_and(|tip| !tip.is_empty()));
        assert_eq!(created["notice"]["dismiss_after_ms"], 3000);

        let response = app.clone().oneshot(get_request("/diary", Some(&alice))).await.unwrap();
        let entries: Vec<DiaryEntry> =
            serde_json::from_value(json_body(response.into_body()).await).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.to_string(), created["entry"]["id"].as_str().unwrap());

        let response = app.oneshot(get_request("/diary", Some(&bob))).await.unwrap();
        assert_eq!(json_body(response.into_body()).await, json!([]));
    }

    #[tokio::test]
    async fn test_text_upload_is_unsupported() {
        let app = app();
        let token = sign(Uuid::new_v4(), TokenType::Access, 300);

        let body = multipart_body("notes.txt", "text/plain", b"good boy", None);
        let response = app.clone().oneshot(upload(&token, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response.into_body()).await["notice"]["kind"], "error");

        let response = app.oneshot(get_request("/diary", Some(&token))).await.unwrap();
        assert_eq!(json_body(response.into_body()).await, json!([]));
    }

    #[tokio::test]
    async fn test_out_of_range_intensity_is_a_bad_request() {
        let token = sign(Uuid::new_v4(), TokenType::Access, 300);
        let body = multipart_body("photo.png", "image/png", &png_bytes(), Some("11"));

        let response = app().oneshot(upload(&token, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_unknown_entry_is_not_found() {
        let token = sign(Uuid::new_v4(), TokenType::Access, 300);
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/diary/{}", Uuid::new_v4()))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tip_for_mood() {
        let response = app().oneshot(get_request("/tips/Sad", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response.into_body()).await;
        assert_eq!(body["mood"], "Sad");
        assert!(
            TipBook::default()
                .tips_for(&MoodLabel::new("sad").unwrap())
                .iter()
                .any(|tip| body["tip"] == tip.as_str())
        );
    }
}
