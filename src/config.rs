// src/config.rs
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 报表页眉中固定的机构信息
#[derive(Debug, Clone)]
pub struct Branding {
    pub school_name: String,
    pub address_lines: Vec<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Branding {
            school_name: "Little Steps Pre-Primary School".into(),
            address_lines: vec!["12 Garden Road".into(), "Springfield".into()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub api_base_url: String,
    pub image_host_url: Option<String>,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub photo_timeout: Duration,
    pub upstream_timeout: Duration,
    pub branding: Branding,
}

impl Config {
    /// 从环境变量读取配置 (调用方负责先执行 dotenvy::dotenv)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let api_base_url = lookup("API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("API_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let session_minutes = parse_number(&lookup, "SESSION_TTL_MINUTES", 720)?;
        let photo_ms = parse_number(&lookup, "PHOTO_TIMEOUT_MS", 5_000)?;
        let upstream_ms = parse_number(&lookup, "UPSTREAM_TIMEOUT_MS", 15_000)?;

        let mut branding = Branding::default();
        if let Some(name) = lookup("SCHOOL_NAME").filter(|v| !v.trim().is_empty()) {
            branding.school_name = name;
        }
        if let Some(address) = lookup("SCHOOL_ADDRESS") {
            branding.address_lines = address
                .split('|')
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect();
        }

        Ok(Config {
            bind_addr,
            api_base_url,
            image_host_url: lookup("IMAGE_HOST_URL").filter(|v| !v.trim().is_empty()),
            jwt_secret,
            session_ttl: chrono::Duration::minutes(session_minutes as i64),
            photo_timeout: Duration::from_millis(photo_ms),
            upstream_timeout: Duration::from_millis(upstream_ms),
            branding,
        })
    }
}

fn parse_number<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
