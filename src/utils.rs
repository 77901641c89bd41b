// src/utils.rs
use actix_web::{HttpResponse, ResponseError};
use chrono::{SecondsFormat, Utc};
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    MissingApiKey,
    ScanInProgress,
    InvalidApiKey(String),
    ScannerUnavailable,
    InvalidRequest(String),
    Settings(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "No API key configured"),
            Self::ScanInProgress => write!(f, "A scan is already running"),
            Self::InvalidApiKey(reason) => write!(f, "API key rejected: {}", reason),
            Self::ScannerUnavailable => write!(f, "Scanner connection is not established"),
            Self::InvalidRequest(reason) => write!(f, "Invalid request: {}", reason),
            Self::Settings(reason) => write!(f, "Failed to save settings: {}", reason),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::ScanInProgress => HttpResponse::Conflict().body(self.to_string()),
            Self::ScannerUnavailable => HttpResponse::ServiceUnavailable().body(self.to_string()),
            Self::Settings(_) => HttpResponse::InternalServerError().body(self.to_string()),
            _ => HttpResponse::BadRequest().body(self.to_string()),
        }
    }
}

/// Current UTC time as an RFC 3339 string, the timestamp format used on records.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// First characters of a key, safe to log.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(6).collect();
    format!("{}…", visible)
}
