// src/validation.rs
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use validator::Validate;

use crate::AppError;

/// 写入请求体：先解析 JSON，再执行字段校验，全部通过后才会访问上游
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // 1. JSON 格式或字段类型错误 (例如未知的班级) 直接返回 400
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        // 2. 字段规则，失败时转换为 AppError::ValidationError
        if let Err(errors) = value.validate() {
            tracing::debug!("请求体校验失败: {}", errors);
            return Err(errors.into());
        }

        Ok(ValidatedJson(value))
    }
}
