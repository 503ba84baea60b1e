use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// Client for the optional external image host. When configured, inline
/// base64 product images are forwarded here instead of being written to the
/// local upload directory; the host answers with a durable URL and a public
/// id used for later reference.
pub struct ImageHost {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
pub struct HostedImage {
    pub url: String,
    pub public_id: String,
}

impl ImageHost {
    pub fn new(endpoint: String) -> Self {
        ImageHost {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    /// Uploads a `data:` URI. The host call is issued once, with no retry;
    /// any failure maps to an internal error for the caller to surface.
    pub async fn upload(&self, data_uri: &str) -> ApiResult<HostedImage> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "image": data_uri,
                "folder": "products",
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "image_host", "upload error: {e}");
                ApiError::Internal("Failed to upload image".into())
            })?;

        if !resp.status().is_success() {
            tracing::warn!(target: "image_host", "upload rejected: {}", resp.status());
            return Err(ApiError::Internal("Failed to upload image".into()));
        }

        resp.json::<HostedImage>()
            .await
            .map_err(|_| ApiError::Internal("Failed to upload image".into()))
    }
}
