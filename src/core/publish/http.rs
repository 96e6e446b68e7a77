use std::fs;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};

use super::{stage_failed, Bundle, ConfigureReport, DeployReceipt, Publisher};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the site digest so the host can detect stale uploads.
pub const SITE_DIGEST_HEADER: &str = "X-Toolshed-Site-Sha256";

/// Publishes to a hosting API over HTTP.
///
/// Configure POSTs a JSON body (with `enabled` set) to `configure_url`; 2xx
/// and 409 Conflict both mean hosting is on. Deploy POSTs the zip bundle to
/// `deploy_url`. A bearer token is read from `token_env` when set.
pub struct HttpPublisher {
    configure_url: Option<String>,
    configure_body: Option<Value>,
    deploy_url: String,
    token_env: String,
    timeout: Duration,
}

impl HttpPublisher {
    pub fn new(
        configure_url: Option<String>,
        configure_body: Option<Value>,
        deploy_url: String,
        token_env: String,
        timeout_secs: u64,
    ) -> Self {
        Self {
            configure_url,
            configure_body,
            deploy_url,
            token_env,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(format!("toolshed/{}", VERSION))
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => request.bearer_auth(token.trim()),
            _ => request,
        }
    }

    fn rejected(&self, code: ErrorCode, response: Response) -> Error {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        stage_failed(
            code,
            self.name(),
            format!("host responded {}: {}", status, excerpt(&body)),
            Some(status.as_u16()),
        )
        .retryable(status.is_server_error())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        format!("{}...", trimmed.chars().take(200).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    fn configure(&self, enable: bool) -> Result<ConfigureReport> {
        let Some(url) = self.configure_url.as_deref() else {
            return Ok(ConfigureReport {
                publisher: self.name().to_string(),
                enabled: enable,
                changed: false,
                detail: Some("no configure_url set".to_string()),
            });
        };

        let mut body = self
            .configure_body
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = &mut body {
            map.insert("enabled".to_string(), Value::Bool(enable));
        }

        let client = self.client()?;
        let response = self
            .authorize(client.post(url).json(&body))
            .send()
            .map_err(|e| {
                stage_failed(ErrorCode::PublishConfigureFailed, self.name(), e.to_string(), None)
                    .retryable(true)
            })?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(ConfigureReport {
                publisher: self.name().to_string(),
                enabled: enable,
                changed: false,
                detail: Some("already configured".to_string()),
            });
        }
        if !status.is_success() {
            return Err(self.rejected(ErrorCode::PublishConfigureFailed, response));
        }

        Ok(ConfigureReport {
            publisher: self.name().to_string(),
            enabled: enable,
            changed: true,
            detail: Some(format!("{} {}", status.as_u16(), url)),
        })
    }

    fn deploy(&self, bundle: &Bundle) -> Result<DeployReceipt> {
        let archive = fs::read(&bundle.path).map_err(|e| {
            stage_failed(ErrorCode::PublishDeployFailed, self.name(), e.to_string(), None)
        })?;

        let client = self.client()?;
        let request = client
            .post(&self.deploy_url)
            .header(CONTENT_TYPE, "application/zip")
            .header(SITE_DIGEST_HEADER, bundle.site_sha256.as_str())
            .body(archive);

        log_status!("publish", "Uploading bundle to {}", self.deploy_url);
        let response = self.authorize(request).send().map_err(|e| {
            stage_failed(ErrorCode::PublishDeployFailed, self.name(), e.to_string(), None)
                .retryable(true)
        })?;

        if !response.status().is_success() {
            return Err(self.rejected(ErrorCode::PublishDeployFailed, response));
        }

        let body = response.text().unwrap_or_default();
        let receipt = DeployReceipt::for_bundle(self.name(), self.deploy_url.clone(), bundle);
        let detail = excerpt(&body);
        Ok(if detail.is_empty() {
            receipt
        } else {
            receipt.with_detail(detail)
        })
    }
}
