#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::admin::{self, AdminService, ProfileUpdate, UserProfile};
use crate::daily::DailyQuestionService;
use crate::error::AppError;
use crate::importer;
use crate::progress::{ProgressService, ProgressView};
use crate::question::{Question, prepare_for_save};
use crate::store::QuestionStore;

const SESSION_COOKIE: &str = "admin_session";

/// Shared application state: the two engines, the admin service and the
/// question store handle the bulk-save route writes through.
pub struct AppState {
    pub daily: DailyQuestionService,
    pub progress: ProgressService,
    pub admin: AdminService,
    pub questions: Arc<dyn QuestionStore>,
}

/// Build the application router.
///
/// Admin routes other than login sit behind the session middleware; student
/// routes are open. Uploads get a raised body limit so workbook files fit.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Admin surface (session required).
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/stats", get(system_stats))
        .route("/api/admin/users/update", post(update_user))
        .route("/api/admin/users/delete", post(delete_user))
        .route(
            "/api/admin/questions",
            get(list_questions).post(save_questions),
        )
        .route("/api/admin/upload-questions", post(upload_questions))
        .route_layer(middleware::from_fn(require_admin))
        // Public surface.
        .route("/api/student/daily-question", get(daily_question))
        .route(
            "/api/student/progress",
            get(get_progress).post(record_progress),
        )
        .route("/api/profile", post(upsert_profile))
        .route("/api/admin/login", post(admin_login))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the application.
pub async fn run(state: Arc<AppState>, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Admin session middleware.
///
/// Lets the request through when the session cookie resolves to a logged-in
/// administrator, and rejects it with 401 otherwise.
async fn require_admin(jar: CookieJar, mut request: Request, next: Next) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(email) = admin::validate_session(cookie.value()) {
            request.extensions_mut().insert(email);
            return next.run(request).await;
        }
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Admin authentication required" })),
    )
        .into_response()
}

async fn daily_question(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let today = Local::now().date_naive();
    let question = state.daily.daily_question(today)?;
    Ok(Json(json!({ "question": question })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    question_id: String,
    #[serde(default)]
    difficulty: String,
}

async fn record_progress(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome =
        state
            .progress
            .record_completion(&req.user_id, &req.question_id, &req.difficulty, Utc::now())?;

    let message = if outcome.already_completed {
        "Question already marked as completed for today"
    } else {
        "Progress updated successfully"
    };

    Ok(Json(json!({
        "success": true,
        "streak": outcome.current_streak,
        "message": message,
    })))
}

#[derive(Deserialize)]
struct ProgressQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProgressQuery>,
) -> Result<Json<ProgressView>, AppError> {
    let user_id = params.user_id.unwrap_or_default();
    let view = state.progress.progress(&user_id)?;
    Ok(Json(view))
}

async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.admin.upsert_profile(profile)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct AdminLoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn admin_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Response, AppError> {
    if state.admin.verify_admin(&req.email, &req.password)? {
        let session_id = admin::create_session(req.email.trim());
        let jar = jar.add(Cookie::new(SESSION_COOKIE, session_id));

        Ok((
            jar,
            Json(json!({ "success": true, "admin": { "email": req.email.trim() } })),
        )
            .into_response())
    } else {
        log::warn!("rejected admin login for {}", req.email);
        Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response())
    }
}

async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let users = state.admin.list_users()?;
    Ok(Json(json!({ "users": users })))
}

async fn system_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stats = state.admin.system_stats()?;
    Ok(Json(json!({ "stats": stats })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    user_id: String,
    update_data: ProfileUpdate,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.admin.update_user(&req.user_id, req.update_data)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteUserRequest {
    user_id: String,
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteUserRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.admin.delete_user(&req.user_id)?;
    Ok(Json(json!({ "success": true })))
}

async fn list_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let questions = state.questions.get_all()?;
    Ok(Json(json!({ "questions": questions })))
}

#[derive(Deserialize)]
struct SaveQuestionsRequest {
    questions: Vec<Question>,
}

/// Bulk-save parsed questions.
///
/// Placeholder ids from the importer get a fresh storage id; everything else
/// upserts by its existing id. The batch commits as a whole or not at all.
async fn save_questions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveQuestionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.questions.is_empty() {
        return Err(AppError::invalid_argument("questions payload is empty"));
    }

    let batch = prepare_for_save(req.questions, Utc::now());
    state.questions.upsert_batch(&batch)?;
    log::info!("saved {} questions", batch.len());

    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully saved {} questions", batch.len()),
    })))
}

/// Accept a multipart upload with a single `file` field and run it through
/// the importer. Nothing is persisted here; the parsed questions go back to
/// the caller for review and a later bulk save.
async fn upload_questions(
    State(_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut file_data = Vec::new();
    let mut filename = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_argument(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| AppError::invalid_argument(format!("failed to read upload: {e}")))?
                .to_vec();
        }
    }

    if file_data.is_empty() {
        return Err(AppError::invalid_argument("No file uploaded"));
    }

    let questions = importer::parse_upload(&file_data, &filename)?;

    Ok(Json(json!({
        "success": true,
        "questions": questions,
        "count": questions.len(),
    })))
}
