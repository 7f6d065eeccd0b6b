use futures::future::BoxFuture;
use reqwest::multipart::Form;
use tracing::{debug, info};

use hookflow_core::config::UploadConfig;
use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::UploadService;

const CLOUDINARY_API_URL: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary-style upload client.
///
/// Posts the payload as a `data:` URI so the service sniffs the resource
/// type itself (`auto/upload`).
pub struct CloudinaryUploader {
    http: reqwest::Client,
    config: UploadConfig,
}

impl CloudinaryUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// The cloud name, once every credential is known to be present.
    fn cloud_name(&self) -> Result<&str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if !present(&self.config.cloud_name)
            || !present(&self.config.api_key)
            || !present(&self.config.api_secret)
        {
            return Err(HookflowError::Configuration(
                "Cloudinary credentials missing (cloud_name, api_key, api_secret)".to_string(),
            ));
        }
        Ok(self.config.cloud_name.as_deref().unwrap_or_default())
    }

    fn endpoint(&self, cloud_name: &str) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(CLOUDINARY_API_URL)
            .trim_end_matches('/');
        format!("{}/{}/auto/upload", base, cloud_name)
    }
}

pub(crate) fn data_uri(base64_payload: &str) -> String {
    format!("data:application/octet-stream;base64,{}", base64_payload)
}

/// `recording.webm` → `recording`.
pub(crate) fn public_id(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

impl UploadService for CloudinaryUploader {
    fn upload(
        &self,
        base64_payload: String,
        filename: String,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            let url = self.endpoint(self.cloud_name()?);

            let mut form = Form::new()
                .text("file", data_uri(&base64_payload))
                .text("upload_preset", self.config.upload_preset.clone());
            if !filename.is_empty() {
                form = form.text("public_id", public_id(&filename).to_string());
            }

            debug!(url = %url, filename = %filename, bytes = base64_payload.len(), "Uploading file");

            let response = self
                .http
                .post(&url)
                .multipart(form)
                .send()
                .await
                .map_err(|e| HookflowError::external("upload", e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(HookflowError::external(
                    "upload",
                    format!("HTTP {}: {}", status, body),
                ));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| HookflowError::external("upload", e))?;

            info!(
                filename = %filename,
                url = json.get("secure_url").and_then(|v| v.as_str()).unwrap_or("-"),
                "File uploaded"
            );
            Ok(json)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> UploadConfig {
        UploadConfig {
            cloud_name: Some("demo".into()),
            api_key: Some("key".into()),
            api_secret: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(
            data_uri("AAAA"),
            "data:application/octet-stream;base64,AAAA"
        );
    }

    #[test]
    fn test_public_id() {
        assert_eq!(public_id("file.webm"), "file");
        assert_eq!(public_id("archive.tar.gz"), "archive.tar");
        assert_eq!(public_id("noext"), "noext");
        assert_eq!(public_id(".hidden"), ".hidden");
    }

    #[test]
    fn test_endpoint() {
        let uploader = CloudinaryUploader::new(configured());
        assert_eq!(
            uploader.endpoint("demo"),
            "https://api.cloudinary.com/v1_1/demo/auto/upload"
        );

        let uploader = CloudinaryUploader::new(UploadConfig {
            base_url: Some("http://localhost:8080/".into()),
            ..configured()
        });
        assert_eq!(uploader.endpoint("x"), "http://localhost:8080/x/auto/upload");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let uploader = CloudinaryUploader::new(UploadConfig {
            api_secret: None,
            ..configured()
        });
        let err = uploader
            .upload("AAAA".into(), "file.webm".into())
            .await
            .unwrap_err();
        assert!(matches!(err, HookflowError::Configuration(_)));
    }
}
