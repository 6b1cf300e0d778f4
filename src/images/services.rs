use std::collections::HashMap;

use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::Multipart;
use crate::state::AppState;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// A multipart body split into text fields and file parts.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadItem>,
}

impl MultipartForm {
    /// Parts with a file name or a non-text content type are kept as files.
    pub async fn read(Multipart(mut mp): Multipart) -> ApiResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|_| ApiError::validation("Malformed multipart body"))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let is_file = field.file_name().is_some()
                || field
                    .content_type()
                    .is_some_and(|ct| !ct.starts_with("text/"));
            if is_file {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::validation("Could not read uploaded file"))?;
                if !body.is_empty() {
                    form.files.insert(name, UploadItem { body, content_type });
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::validation("Malformed multipart body"))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadItem> {
        self.files.remove(name)
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }
}

pub fn check_image(item: &UploadItem, max_bytes: usize) -> ApiResult<()> {
    if !item.content_type.starts_with("image/") {
        return Err(ApiError::validation("You can only upload image files!"));
    }
    if item.body.len() > max_bytes {
        let mb = max_bytes / (1024 * 1024);
        return Err(ApiError::validation(format!(
            "Image must be smaller than {mb}MB!"
        )));
    }
    Ok(())
}

/// Stores an image under `<prefix>/<uuid>.<ext>` and returns its public URL.
pub async fn upload_image(st: &AppState, prefix: &str, item: UploadItem) -> anyhow::Result<String> {
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(st.storage.object_url(&key))
}

/// Removes an object previously returned by [`upload_image`]. Failures are
/// logged and swallowed; an orphaned object is preferable to a failed delete.
pub async fn remove_image(st: &AppState, url: &str) {
    let Some(key) = st.storage.key_from_url(url) else {
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "could not delete stored image");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}
