//! Batch upload of usage records to the collection endpoint.

use crate::record::Record;
use crate::{Error, Result};

use edgegate_auth::AuthContext;
use serde::{Deserialize, Serialize};

/// Stateless batch-POST client for the legacy collection endpoint.
///
/// Shares nothing with the JWT core beyond the [`AuthContext`] identity type.
pub struct LegacyUploader {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct UploadRequest {
    organization: String,
    environment: String,
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    accepted: i64,
    rejected: i64,
}

impl LegacyUploader {
    /// Create an uploader with its own HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// No background resources to set up.
    pub fn start(&self) {}

    /// No background resources to release.
    pub fn close(&self) {}

    /// POST `records` as one batch for the tenant described by `ctx`.
    ///
    /// Empty input is a no-op. HTTP 200 means the batch was accepted; any
    /// other status is a rejection carrying the response body.
    pub async fn send_records(&self, ctx: &AuthContext, records: &[Record]) -> Result<()> {
        let Some(request) = build_request(ctx, records)? else {
            return Ok(());
        };

        let url = ctx.analytics_url();
        tracing::debug!(count = request.records.len(), url = %url, "sending analytics records");

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status.is_success() {
            match serde_json::from_str::<UploadResponse>(&body) {
                Ok(counts) => tracing::debug!(
                    accepted = counts.accepted,
                    rejected = counts.rejected,
                    "analytics accepted"
                ),
                Err(_) => tracing::debug!(body = %body, "analytics accepted"),
            }
            Ok(())
        } else {
            Err(Error::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Default for LegacyUploader {
    fn default() -> Self {
        Self::new()
    }
}

fn build_request(ctx: &AuthContext, incoming: &[Record]) -> Result<Option<UploadRequest>> {
    if incoming.is_empty() {
        return Ok(None);
    }
    if ctx.organization.is_empty() || ctx.environment.is_empty() {
        return Err(Error::Configuration(
            "organization and environment are required".to_string(),
        ));
    }

    let records = incoming
        .iter()
        .map(|r| r.clone().ensure_fields(ctx))
        .collect();

    Ok(Some(UploadRequest {
        organization: ctx.organization.clone(),
        environment: ctx.environment.clone(),
        records,
    }))
}
