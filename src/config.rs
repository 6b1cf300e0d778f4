use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_url: String,
    pub max_image_bytes: usize,
}

/// CometChat REST credentials. Chat provisioning is skipped when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub app_id: String,
    pub region: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    pub max_attempts: i32,
    pub sms_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cookie_secret: String,
    pub cookie_domain: Option<String>,
    pub storage: StorageConfig,
    pub chat: Option<ChatConfig>,
    pub otp: OtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dietdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dietdesk-staff".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };

        let cookie_secret = std::env::var("COOKIE_SECRET")?;
        anyhow::ensure!(
            cookie_secret.len() >= 32,
            "COOKIE_SECRET must be at least 32 characters"
        );

        let endpoint = std::env::var("MINIO_ENDPOINT")?;
        let bucket = std::env::var("MINIO_BUCKET")?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            endpoint,
            bucket,
            public_url,
            max_image_bytes: env_parse::<usize>("MAX_IMAGE_MB").unwrap_or(5) * 1024 * 1024,
        };

        let chat = match (
            std::env::var("COMETCHAT_APP_ID"),
            std::env::var("COMETCHAT_REGION"),
            std::env::var("COMETCHAT_API_KEY"),
        ) {
            (Ok(app_id), Ok(region), Ok(api_key)) => Some(ChatConfig {
                app_id,
                region,
                api_key,
            }),
            _ => None,
        };

        let otp = OtpConfig {
            ttl_minutes: env_parse("OTP_TTL_MINUTES").unwrap_or(10),
            max_attempts: env_parse("OTP_MAX_ATTEMPTS").unwrap_or(5),
            sms_webhook_url: std::env::var("SMS_WEBHOOK_URL").ok(),
        };

        Ok(Self {
            database_url,
            jwt,
            cookie_secret,
            cookie_domain: std::env::var("COOKIE_DOMAIN").ok(),
            storage,
            chat,
            otp,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
