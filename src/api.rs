// src/api.rs
// 上游记录服务的 REST 客户端：只负责构造请求与检查状态码，不含业务逻辑
use std::time::Duration;

use reqwest::{multipart, Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::Config;
use crate::models::{
    ClassLevel, CreateTeacherSchema, LoginSchema, PhotoUpload, PlanSchema, PlanType,
    ProgressEntry, ProgressSchema, ResetPasswordSchema, Student, StudentSchema, Teacher,
    TeachingPlan, UpdateTeacherSchema, UpstreamLogin,
};
use crate::AppError;

/// 转发给上游的查询参数 (只包含上游支持的那部分过滤条件)
#[derive(Debug, Default, Clone)]
pub struct UpstreamQuery {
    pub class: Option<ClassLevel>,
    pub teacher_id: Option<String>,
    pub plan_type: Option<PlanType>,
    pub student_id: Option<String>,
}

impl UpstreamQuery {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(class) = self.class {
            pairs.push(("class", class.as_str().to_string()));
        }
        if let Some(id) = &self.teacher_id {
            pairs.push(("teacherId", id.clone()));
        }
        if let Some(plan_type) = self.plan_type {
            pairs.push(("type", plan_type.as_str().to_string()));
        }
        if let Some(id) = &self.student_id {
            pairs.push(("studentId", id.clone()));
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    image_host_url: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(ApiClient {
            http,
            base_url: config.api_base_url.clone(),
            image_host_url: config.image_host_url.clone(),
        })
    }

    fn url(&self, path: &str, query: &UpstreamQuery) -> Result<Url, AppError> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), query.pairs()).map_err(|e| {
            tracing::error!("无效的上游地址 {}{}: {}", self.base_url, path, e);
            AppError::Internal
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &UpstreamQuery,
        token: &str,
    ) -> Result<RequestBuilder, AppError> {
        Ok(self
            .http
            .request(method, self.url(path, query)?)
            .bearer_auth(token))
    }

    // --- 1. 登录 ---

    pub async fn login(&self, credentials: &LoginSchema) -> Result<UpstreamLogin, AppError> {
        let resp = self
            .http
            .post(self.url("/api/auth/login", &UpstreamQuery::default())?)
            .json(credentials)
            .send()
            .await?;
        read_json(resp).await
    }

    // --- 2. 查询 ---

    pub async fn list_students(
        &self,
        token: &str,
        query: &UpstreamQuery,
    ) -> Result<Vec<Student>, AppError> {
        let query = UpstreamQuery {
            class: query.class,
            teacher_id: query.teacher_id.clone(),
            ..Default::default()
        };
        let resp = self
            .request(Method::GET, "/api/students", &query, token)?
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn list_progress(
        &self,
        token: &str,
        student_id: Option<&str>,
    ) -> Result<Vec<ProgressEntry>, AppError> {
        let query = UpstreamQuery {
            student_id: student_id.map(str::to_string),
            ..Default::default()
        };
        let resp = self
            .request(Method::GET, "/api/progress", &query, token)?
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn list_plans(
        &self,
        token: &str,
        query: &UpstreamQuery,
    ) -> Result<Vec<TeachingPlan>, AppError> {
        let query = UpstreamQuery {
            student_id: None,
            ..query.clone()
        };
        let resp = self
            .request(Method::GET, "/api/teaching-plans", &query, token)?
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn list_teachers(&self, token: &str) -> Result<Vec<Teacher>, AppError> {
        let resp = self
            .request(Method::GET, "/api/teachers", &UpstreamQuery::default(), token)?
            .send()
            .await?;
        read_json(resp).await
    }

    // --- 3. 写入 (成功返回上游的资源体) ---

    pub async fn create_student(
        &self,
        token: &str,
        body: &StudentSchema,
    ) -> Result<Student, AppError> {
        self.send_json(Method::POST, "/api/students".into(), token, body).await
    }

    pub async fn update_student(
        &self,
        token: &str,
        id: &str,
        body: &StudentSchema,
    ) -> Result<Student, AppError> {
        self.send_json(Method::PUT, format!("/api/students/{id}"), token, body)
            .await
    }

    pub async fn delete_student(&self, token: &str, id: &str) -> Result<(), AppError> {
        self.delete(format!("/api/students/{id}"), token).await
    }

    pub async fn create_progress(
        &self,
        token: &str,
        body: &ProgressSchema,
    ) -> Result<ProgressEntry, AppError> {
        self.send_json(Method::POST, "/api/progress".into(), token, body).await
    }

    pub async fn update_progress(
        &self,
        token: &str,
        id: &str,
        body: &ProgressSchema,
    ) -> Result<ProgressEntry, AppError> {
        self.send_json(Method::PUT, format!("/api/progress/{id}"), token, body)
            .await
    }

    pub async fn delete_progress(&self, token: &str, id: &str) -> Result<(), AppError> {
        self.delete(format!("/api/progress/{id}"), token).await
    }

    pub async fn create_plan(
        &self,
        token: &str,
        body: &PlanSchema,
    ) -> Result<TeachingPlan, AppError> {
        self.send_json(Method::POST, "/api/teaching-plans".into(), token, body)
            .await
    }

    pub async fn update_plan(
        &self,
        token: &str,
        id: &str,
        body: &PlanSchema,
    ) -> Result<TeachingPlan, AppError> {
        self.send_json(Method::PUT, format!("/api/teaching-plans/{id}"), token, body)
            .await
    }

    pub async fn delete_plan(&self, token: &str, id: &str) -> Result<(), AppError> {
        self.delete(format!("/api/teaching-plans/{id}"), token).await
    }

    pub async fn create_teacher(
        &self,
        token: &str,
        body: &CreateTeacherSchema,
    ) -> Result<Teacher, AppError> {
        self.send_json(Method::POST, "/api/teachers".into(), token, body).await
    }

    pub async fn update_teacher(
        &self,
        token: &str,
        id: &str,
        body: &UpdateTeacherSchema,
    ) -> Result<Teacher, AppError> {
        self.send_json(Method::PUT, format!("/api/teachers/{id}"), token, body)
            .await
    }

    pub async fn delete_teacher(&self, token: &str, id: &str) -> Result<(), AppError> {
        self.delete(format!("/api/teachers/{id}"), token).await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        id: &str,
        body: &ResetPasswordSchema,
    ) -> Result<(), AppError> {
        let resp = self
            .request(
                Method::PUT,
                &format!("/api/teachers/{id}/password"),
                &UpstreamQuery::default(),
                token,
            )?
            .json(body)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: String,
        token: &str,
        body: &B,
    ) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(method, &path, &UpstreamQuery::default(), token)?
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn delete(&self, path: String, token: &str) -> Result<(), AppError> {
        let resp = self
            .request(Method::DELETE, &path, &UpstreamQuery::default(), token)?
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    // --- 4. 照片 (第三方图床) ---

    pub async fn upload_photo(
        &self,
        file_name: String,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<PhotoUpload, AppError> {
        let url = self
            .image_host_url
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Photo uploads are not configured".into()))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|_| {
                AppError::BadRequest(format!("Unsupported content type: {content_type}"))
            })?;
        let form = multipart::Form::new().part("file", part);

        let resp = self.http.post(url).multipart(form).send().await?;
        read_json(resp).await
    }

    /// 下载照片原始字节；超时由调用方以 `limit` 限定
    pub async fn fetch_photo(&self, url: &str, limit: Duration) -> Result<Vec<u8>, AppError> {
        let resp = self.http.get(url).timeout(limit).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

async fn check_status(resp: Response) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    // 失败时上游返回 { message }，若无法解析则退回状态描述
    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Upstream error")
                .to_string()
        });

    Err(AppError::Upstream {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, AppError> {
    let resp = check_status(resp).await?;
    Ok(resp.json::<T>().await?)
}
