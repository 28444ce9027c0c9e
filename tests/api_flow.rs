// tests/api_flow.rs
// 端到端：本服务 + 一个内存中的假上游，走真实的 HTTP
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use calamine::{open_workbook_from_rs, Reader, Xlsx};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
use kinder_records::{app, config::Config, AppState};
use serde_json::{json, Value};

// --- 1. 假上游 ---

fn tiny_png() -> Vec<u8> {
    let pixels = [200u8, 40, 40, 40, 200, 40, 40, 40, 200, 250, 250, 250];
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, 2, 2, ColorType::Rgb8)
        .unwrap();
    out
}

async fn upstream_login(Json(body): Json<Value>) -> impl IntoResponse {
    let email = body["email"].as_str().unwrap_or_default();
    if body["password"] != "secret1" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        );
    }
    let (id, name, role) = if email.starts_with("admin") {
        ("t0", "Asha", "admin")
    } else {
        ("t1", "Meera", "teacher")
    };
    (
        StatusCode::OK,
        Json(json!({
            "token": format!("upstream-{id}"),
            "user": { "_id": id, "name": name, "email": email, "role": role, "assignedClasses": ["LKG"] }
        })),
    )
}

// 假上游的行为开关
#[derive(Clone)]
struct Upstream {
    base: String,
    // 模拟一个不支持 ?studentId= 的上游：总是返回全部进度记录
    ignores_student_filter: bool,
}

async fn upstream_students(State(up): State<Upstream>) -> Json<Value> {
    let base = &up.base;
    Json(json!([
        { "_id": "a", "name": "Aarav", "age": 3, "class": "Nursery", "learningAbility": "Talented",
          "writingSpeed": "N/A", "teacherId": "t1", "photoUrl": format!("{base}/photos/a.png") },
        { "_id": "b", "name": "Bela", "age": 4, "class": "LKG", "learningAbility": "Average",
          "writingSpeed": "Slow Writing", "teacherId": "t1", "photoUrl": format!("{base}/photos/missing.png") },
        { "_id": "c", "name": "Chitra", "age": 5, "class": "UKG", "learningAbility": "Slow Learner",
          "writingSpeed": "Speed Writing", "teacherId": "t2", "photoUrl": format!("{base}/photos/slow.png") }
    ]))
}

fn progress_entry(id: &str, student_id: &str, date: &str, rating: &str) -> Value {
    json!({ "_id": id, "studentId": student_id, "date": date, "socialSkills": rating,
            "preLiteracy": "Good", "preNumeracy": "Good", "motorSkills": "Good",
            "emotionalDev": rating, "comments": "Shares toys" })
}

async fn upstream_progress(
    State(up): State<Upstream>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let entry = |id: &str, date: &str, rating: &str| progress_entry(id, "a", date, rating);
    if up.ignores_student_filter {
        return (
            StatusCode::OK,
            Json(json!([
                entry("p1", "2024-01-10", "Good"),
                progress_entry("p3", "b", "2024-01-12", "Needs Improvement")
            ])),
        );
    }
    match q.get("studentId").map(String::as_str) {
        Some("a") => (
            StatusCode::OK,
            Json(json!([
                entry("p2", "2024-02-10T00:00:00.000Z", "Excellent"),
                entry("p1", "2024-01-10", "Good")
            ])),
        ),
        Some("c") => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No progress found" })),
        ),
        _ => (StatusCode::OK, Json(json!([]))),
    }
}

async fn upstream_photo(Path(name): Path<String>) -> impl IntoResponse {
    match name.as_str() {
        "a.png" => (StatusCode::OK, tiny_png()),
        "slow.png" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, tiny_png())
        }
        _ => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

async fn upstream_create_teacher(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "_id": "t9",
            "name": body["name"],
            "email": body["email"],
            "role": body["role"]
        })),
    )
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_upstream(ignores_student_filter: bool) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = Router::new()
        .route("/api/auth/login", post(upstream_login))
        .route("/api/students", get(upstream_students))
        .route("/api/progress", get(upstream_progress))
        .route("/api/teaching-plans", get(|| async { Json(json!([])) }))
        .route("/api/teachers", post(upstream_create_teacher))
        .route("/photos/:name", get(upstream_photo))
        .with_state(Upstream {
            base: base.clone(),
            ignores_student_filter,
        });
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}

// --- 2. 被测服务 ---

struct Harness {
    base: String,
    http: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        Self::with_upstream(false).await
    }

    async fn with_upstream(ignores_student_filter: bool) -> Self {
        let upstream = start_upstream(ignores_student_filter).await;
        let config = Config::from_lookup(|key| match key {
            "API_BASE_URL" => Some(upstream.clone()),
            "JWT_SECRET" => Some("test-secret".into()),
            "PHOTO_TIMEOUT_MS" => Some("300".into()),
            _ => None,
        })
        .unwrap();
        let state = AppState::new(config).unwrap();
        Harness {
            base: serve(app(state)).await,
            http: reqwest::Client::new(),
        }
    }

    async fn login(&self, email: &str) -> String {
        let resp = self
            .http
            .post(format!("{}/api/login", self.base))
            .json(&json!({ "email": email, "password": "secret1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

// --- 3. 用例 ---

#[tokio::test]
async fn session_lives_from_login_until_logout() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;

    let resp = h.get("/api/session", &token).await;
    assert_eq!(resp.status(), 200);
    let session: Value = resp.json().await.unwrap();
    assert_eq!(session["name"], "Meera");
    assert_eq!(session["role"], "teacher");
    assert!(session.get("apiToken").is_none());

    let resp = h
        .http
        .post(format!("{}/api/logout", h.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    assert_eq!(h.get("/api/session", &token).await.status(), 401);
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let h = Harness::start().await;
    let resp = h
        .http
        .post(format!("{}/api/login", h.base))
        .json(&json!({ "email": "meera@school.test", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn records_are_filtered_locally() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;

    let students: Value = h
        .get("/api/records/students?teacherId=t1&search=BEL", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(students.as_array().unwrap().len(), 1);
    assert_eq!(students[0]["name"], "Bela");

    let progress: Value = h
        .get("/api/records/progress?startDate=2024-02-01&endDate=2024-02-29", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(progress.as_array().unwrap().len(), 1);
    assert_eq!(progress[0]["id"], "p2");
    assert_eq!(progress[0]["emotionalDevelopment"], "Excellent");
}

#[tokio::test]
async fn half_open_date_range_is_rejected() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;
    let resp = h
        .get("/api/records/progress?startDate=2024-01-01", &token)
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn student_pdf_survives_missing_and_slow_photos() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;

    let resp = h
        .get("/api/reports/students?format=pdf&includePhotos=true", &token)
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"student_report_"));
    assert!(disposition.ends_with(".pdf\""));

    let bytes = resp.bytes().await.unwrap();
    let doc = lopdf::Document::load_mem(&bytes).expect("PDF should parse");
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    assert!(!pages.is_empty());

    // 一张照片 404、一张超时，三名学生的文字仍然完整
    let text = doc.extract_text(&pages).unwrap();
    assert!(text.contains("Student Summary"));
    for name in ["Aarav", "Bela", "Chitra"] {
        assert!(text.contains(name), "missing {name} in PDF text");
    }
}

#[tokio::test]
async fn progress_is_not_duplicated_when_upstream_ignores_student_filter() {
    let h = Harness::with_upstream(true).await;
    let token = h.login("meera@school.test").await;

    let progress: Value = h
        .get("/api/records/progress", &token)
        .await
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = progress
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["p1", "p3"]);

    let stats: Value = h.get("/api/dashboard", &token).await.json().await.unwrap();
    assert_eq!(stats["totalProgressEntries"], 2);
}

#[tokio::test]
async fn empty_plan_reports_still_render() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;

    let pdf = h.get("/api/reports/plans?format=pdf", &token).await;
    assert_eq!(pdf.status(), 200);
    let bytes = pdf.bytes().await.unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    let xlsx = h.get("/api/reports/plans?format=xlsx", &token).await;
    assert_eq!(xlsx.status(), 200);
    let disposition = xlsx.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("plan_report_") && disposition.ends_with(".xlsx\""));
    let bytes = xlsx.bytes().await.unwrap().to_vec();
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range("Plans").unwrap();
    assert_eq!(range.get_value((1, 0)).map(|c| c.to_string()), Some("No data available".into()));
}

#[tokio::test]
async fn student_workbook_lists_every_filtered_student() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;

    let resp = h.get("/api/reports/students?format=xlsx&class=all", &token).await;
    assert_eq!(resp.status(), 200);
    let bytes = resp.bytes().await.unwrap().to_vec();
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range("Students").unwrap();
    // 表头 + 3 名学生
    assert_eq!(range.height(), 4);
}

#[tokio::test]
async fn unknown_report_kind_is_not_found() {
    let h = Harness::start().await;
    let token = h.login("meera@school.test").await;
    assert_eq!(h.get("/api/reports/grades", &token).await.status(), 404);
}

#[tokio::test]
async fn teacher_management_requires_admin() {
    let h = Harness::start().await;
    let body = json!({
        "name": "Ravi", "email": "ravi@school.test", "password": "secret1",
        "role": "teacher", "assignedClasses": ["UKG"]
    });

    let teacher = h.login("meera@school.test").await;
    let resp = h
        .http
        .post(format!("{}/api/teachers", h.base))
        .bearer_auth(&teacher)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let admin = h.login("admin@school.test").await;
    let resp = h
        .http
        .post(format!("{}/api/teachers", h.base))
        .bearer_auth(&admin)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["id"], "t9");
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let h = Harness::start().await;
    let resp = h
        .http
        .get(format!("{}/api/records/students", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
