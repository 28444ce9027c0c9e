// src/lib.rs
use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod models;
pub mod report;
pub mod service;
pub mod validation;

pub use error::AppError;

use api::ApiClient;
use auth::SessionStore;
use config::Config;
use handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let api = ApiClient::new(&config)?;
        Ok(AppState {
            config: Arc::new(config),
            api,
            sessions: SessionStore::default(),
        })
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        // 会话
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/session", get(session_handler))
        // 查询与报表
        .route("/api/records/:kind", get(list_records_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/reports/:kind", get(report_handler))
        // 学生
        .route("/api/students", post(create_student_handler))
        .route(
            "/api/students/:id",
            put(update_student_handler).delete(delete_student_handler),
        )
        // 进度记录
        .route("/api/progress", post(create_progress_handler))
        .route(
            "/api/progress/:id",
            put(update_progress_handler).delete(delete_progress_handler),
        )
        // 教学计划
        .route("/api/teaching-plans", post(create_plan_handler))
        .route(
            "/api/teaching-plans/:id",
            put(update_plan_handler).delete(delete_plan_handler),
        )
        // 教师管理
        .route("/api/teachers", post(create_teacher_handler))
        .route(
            "/api/teachers/:id",
            put(update_teacher_handler).delete(delete_teacher_handler),
        )
        .route("/api/teachers/:id/password", put(reset_password_handler))
        // 照片
        .route("/api/photos", post(upload_photo_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
