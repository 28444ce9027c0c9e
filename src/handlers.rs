// src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{create_jwt, Session};
use crate::dashboard::DashboardStats;
use crate::filter::FilterQuery;
use crate::models::{
    AuthResponse, CreateTeacherSchema, LoginSchema, PhotoUpload, PlanSchema, ProgressEntry,
    ProgressSchema, ResetPasswordSchema, Student, StudentSchema, Teacher, TeachingPlan,
    UpdateTeacherSchema,
};
use crate::report::{ReportFormat, ReportKind, ReportOptions};
use crate::service::{self, RecordKind, Records};
use crate::validation::ValidatedJson;
use crate::{AppError, AppState};

// --- 1. 登录 / 登出 / 当前会话 ---

pub async fn login_handler(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginSchema>,
) -> Result<Json<AuthResponse>, AppError> {
    // 凭据由上游校验，这里只建立本地会话
    let upstream = state.api.login(&payload).await.map_err(|e| match e {
        AppError::Upstream { status: 400 | 401, .. } => {
            AppError::Auth("Invalid email or password".into())
        }
        other => other,
    })?;

    let session = Session::new(upstream.user, upstream.token, state.config.session_ttl);
    let token = create_jwt(&session, &state.config.jwt_secret)?;
    tracing::info!(user = %session.user_id, role = session.role.as_str(), "登录成功");

    let response = AuthResponse {
        token,
        name: session.name.clone(),
        role: session.role,
        expires_at: session.expires_at.timestamp(),
    };
    state.sessions.insert(session)?;
    Ok(Json(response))
}

pub async fn logout_handler(
    session: Session,
    State(state): State<AppState>,
) -> StatusCode {
    state.sessions.remove(&session.id);
    tracing::info!(user = %session.user_id, "已登出");
    StatusCode::NO_CONTENT
}

pub async fn session_handler(session: Session) -> Json<Session> {
    Json(session)
}

// --- 2. 列表与仪表盘 (GET /records/:kind, GET /dashboard) ---

pub async fn list_records_handler(
    session: Session,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Records>, AppError> {
    let kind: RecordKind = kind.parse()?;
    let spec = query.into_spec()?;
    let records = service::list_filtered(&state.api, &session, kind, &spec).await?;
    Ok(Json(records))
}

pub async fn dashboard_handler(
    session: Session,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let spec = query.into_spec()?;
    Ok(Json(service::dashboard(&state.api, &session, &spec).await?))
}

// --- 3. 报表下载 (GET /reports/:kind) ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub format: Option<String>,
    pub include_photos: Option<bool>,
    pub include_progress_history: Option<bool>,
}

impl ReportParams {
    fn options(&self) -> ReportOptions {
        let defaults = ReportOptions::default();
        ReportOptions {
            include_photos: self.include_photos.unwrap_or(defaults.include_photos),
            include_progress_history: self
                .include_progress_history
                .unwrap_or(defaults.include_progress_history),
        }
    }
}

pub async fn report_handler(
    session: Session,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ReportParams>,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    let kind: ReportKind = kind.parse()?;
    let format: ReportFormat = params.format.as_deref().unwrap_or("pdf").parse()?;
    let spec = query.into_spec()?;

    let file =
        service::generate_report(&state, &session, kind, format, &spec, params.options()).await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}

// --- 4. 学生 ---

pub async fn create_student_handler(
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<StudentSchema>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let student = state.api.create_student(&session.api_token, &body).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn update_student_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<StudentSchema>,
) -> Result<Json<Student>, AppError> {
    Ok(Json(
        state.api.update_student(&session.api_token, &id, &body).await?,
    ))
}

/// 管理员或该学生的负责教师可以删除
pub async fn delete_student_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if !session.is_admin() {
        let students = state
            .api
            .list_students(&session.api_token, &Default::default())
            .await?;
        let student = students
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound("Student not found".into()))?;
        if student.teacher_id.as_deref() != Some(session.user_id.as_str()) {
            return Err(AppError::Forbidden(
                "Only an admin or the assigned teacher can delete this student".into(),
            ));
        }
    }

    state.api.delete_student(&session.api_token, &id).await?;
    tracing::info!(user = %session.user_id, student = %id, "学生已删除");
    Ok(StatusCode::NO_CONTENT)
}

// --- 5. 进度记录 ---

pub async fn create_progress_handler(
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProgressSchema>,
) -> Result<(StatusCode, Json<ProgressEntry>), AppError> {
    let entry = state.api.create_progress(&session.api_token, &body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_progress_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ProgressSchema>,
) -> Result<Json<ProgressEntry>, AppError> {
    Ok(Json(
        state.api.update_progress(&session.api_token, &id, &body).await?,
    ))
}

pub async fn delete_progress_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.api.delete_progress(&session.api_token, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- 6. 教学计划 ---

pub async fn create_plan_handler(
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PlanSchema>,
) -> Result<(StatusCode, Json<TeachingPlan>), AppError> {
    let plan = state
        .api
        .create_plan(&session.api_token, &body.with_end_date())
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PlanSchema>,
) -> Result<Json<TeachingPlan>, AppError> {
    let plan = state
        .api
        .update_plan(&session.api_token, &id, &body.with_end_date())
        .await?;
    Ok(Json(plan))
}

pub async fn delete_plan_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.api.delete_plan(&session.api_token, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- 7. 教师管理 (仅管理员) ---

pub async fn create_teacher_handler(
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateTeacherSchema>,
) -> Result<(StatusCode, Json<Teacher>), AppError> {
    session.require_admin()?;
    let teacher = state.api.create_teacher(&session.api_token, &body).await?;
    tracing::info!(admin = %session.user_id, teacher = %teacher.id, "已创建教师");
    Ok((StatusCode::CREATED, Json(teacher)))
}

pub async fn update_teacher_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UpdateTeacherSchema>,
) -> Result<Json<Teacher>, AppError> {
    session.require_admin()?;
    Ok(Json(
        state.api.update_teacher(&session.api_token, &id, &body).await?,
    ))
}

pub async fn delete_teacher_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    session.require_admin()?;
    if id == session.user_id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }
    state.api.delete_teacher(&session.api_token, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password_handler(
    Path(id): Path<String>,
    session: Session,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ResetPasswordSchema>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_admin()?;
    state.api.reset_password(&session.api_token, &id, &body).await?;
    tracing::info!(admin = %session.user_id, teacher = %id, "密码已重置");
    Ok(Json(json!({ "message": "Password updated" })))
}

// --- 8. 照片上传 (POST /photos?filename=) ---

#[derive(Debug, Deserialize)]
pub struct PhotoParams {
    pub filename: Option<String>,
}

pub async fn upload_photo_handler(
    session: Session,
    State(state): State<AppState>,
    Query(params): Query<PhotoParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<PhotoUpload>), AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image uploads are accepted".into()));
    }
    if body.is_empty() {
        return Err(AppError::BadRequest("Photo body is empty".into()));
    }

    let file_name = params.filename.unwrap_or_else(|| "photo".into());
    let upload = state
        .api
        .upload_photo(file_name, &content_type, body.to_vec())
        .await?;
    tracing::info!(user = %session.user_id, url = %upload.url, "照片已上传");
    Ok((StatusCode::CREATED, Json(upload)))
}
