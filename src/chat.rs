use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ChatConfig;

/// Creates chat identities for staff in the third-party chat service.
#[async_trait]
pub trait ChatProvisioner: Send + Sync {
    async fn create_user(&self, uid: &str, name: &str) -> anyhow::Result<()>;
}

/// CometChat REST API v3.
pub struct CometChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct CreateUserBody<'a> {
    uid: &'a str,
    name: &'a str,
}

impl CometChat {
    pub fn new(http: reqwest::Client, cfg: &ChatConfig) -> Self {
        Self {
            http,
            base_url: format!("https://{}.api-{}.cometchat.io/v3", cfg.app_id, cfg.region),
            api_key: cfg.api_key.clone(),
        }
    }
}

#[async_trait]
impl ChatProvisioner for CometChat {
    async fn create_user(&self, uid: &str, name: &str) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/users", self.base_url))
            .header("apikey", &self.api_key)
            .json(&CreateUserBody { uid, name })
            .send()
            .await
            .context("cometchat create user request")?
            .error_for_status()
            .context("cometchat create user status")?;
        info!(%uid, "chat user created");
        Ok(())
    }
}

/// Used when no chat credentials are configured.
pub struct DisabledChat;

#[async_trait]
impl ChatProvisioner for DisabledChat {
    async fn create_user(&self, uid: &str, _name: &str) -> anyhow::Result<()> {
        debug!(%uid, "chat provisioning disabled; skipping");
        Ok(())
    }
}
