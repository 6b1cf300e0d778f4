use serde::{Deserialize, Serialize};

use super::claims::Role;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned after a successful login; mirrors the cookies that were set.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub role: Role,
    pub id: i64,
    pub name: String,
    pub username: String,
    pub phone: String,
    pub email: String,
    pub logo: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestOtpRequest {
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Decrypted session as seen by the dashboard.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: i64,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub logo: Option<String>,
}
