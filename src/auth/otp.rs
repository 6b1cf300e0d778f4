use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::validate::OTP_LEN;

/// Random zero-padded numeric code.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..10u32.pow(OTP_LEN as u32));
    format!("{:0width$}", n, width = OTP_LEN)
}

/// Delivers a one-time password to a phone number.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone: &str, code: &str) -> anyhow::Result<()>;
}

/// Development sender: the code only shows up at debug level.
pub struct TracingOtpSender;

#[async_trait]
impl OtpSender for TracingOtpSender {
    async fn send(&self, phone: &str, code: &str) -> anyhow::Result<()> {
        debug!(%phone, %code, "otp issued");
        Ok(())
    }
}

/// Posts `{phone, message}` to an SMS gateway webhook.
pub struct WebhookOtpSender {
    http: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    phone: &'a str,
    message: String,
}

impl WebhookOtpSender {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl OtpSender for WebhookOtpSender {
    async fn send(&self, phone: &str, code: &str) -> anyhow::Result<()> {
        let payload = SmsPayload {
            phone,
            message: format!("{code} is your password reset code. It expires soon, do not share it."),
        };
        self.http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("sms webhook request")?
            .error_for_status()
            .context("sms webhook status")?;
        debug!(%phone, "otp handed to sms webhook");
        Ok(())
    }
}
