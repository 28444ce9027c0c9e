// src/auth.rs
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ClassLevel, Role, Teacher};
use crate::{AppError, AppState};

// --- 1. 会话对象 (显式传递，不使用全局状态) ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub classes: Vec<ClassLevel>,
    // 转发给上游 API 的令牌，不回传给前端
    #[serde(skip)]
    pub api_token: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: Teacher, api_token: String, ttl: chrono::Duration) -> Self {
        let started_at = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            classes: user.assigned_classes,
            api_token,
            started_at,
            expires_at: started_at + ttl,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }
}

/// 登录时创建 (init-on-load)，登出时清除 (clear-on-logout)
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    /// 写入新会话，同时清理已过期的会话；锁损坏时返回错误而不是静默丢弃
    pub fn insert(&self, session: Session) -> Result<(), AppError> {
        let mut map = self.inner.write().map_err(|_| {
            tracing::error!("会话存储锁已损坏");
            AppError::Internal
        })?;
        let now = Utc::now();
        map.retain(|_, s| s.expires_at > now);
        map.insert(session.id, session);
        Ok(())
    }

    /// 过期的会话在读取时顺便移除
    pub fn get(&self, id: &Uuid) -> Option<Session> {
        let session = self.inner.read().ok()?.get(id).cloned()?;
        if session.expires_at <= Utc::now() {
            self.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, id: &Uuid) -> Option<Session> {
        self.inner.write().ok()?.remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- 2. JWT 处理 ---

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 会话 ID
    pub role: Role,
    pub exp: usize, // 过期时间
}

pub fn create_jwt(session: &Session, secret: &str) -> Result<String, AppError> {
    let claims = Claims {
        sub: session.id.to_string(),
        role: session.role,
        exp: session.expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("JWT 签发失败: {}", e);
        AppError::Internal
    })
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT 验证失败: {}", e);
        AppError::Auth("Token expired or invalid".into())
    })
}

// --- 3. 核心：会话提取器 ---
// Handler 中通过 (session: Session) 获取当前登录用户

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 1. 从 HTTP Header 提取 Bearer Token
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Auth("Missing or malformed bearer token".into()))?;

        // 2. 验证 Token，并找到仍然有效的会话
        let claims = decode_jwt(bearer.token(), &state.config.jwt_secret)?;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Auth("Token expired or invalid".into()))?;

        state
            .sessions
            .get(&id)
            .ok_or_else(|| AppError::Auth("Session has ended, please sign in again".into()))
    }
}
