//! Usage records accepted by the collection endpoint.

use edgegate_auth::AuthContext;
use serde::{Deserialize, Serialize};

const RECORD_TYPE: &str = "APIAnalytics";

/// One request's worth of usage data.
///
/// Timestamps are epoch milliseconds. Fields left empty by the producer are
/// filled from the auth context before upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Record discriminator expected by the collector.
    #[serde(rename = "recordType")]
    pub record_type: String,

    /// Organization the traffic belongs to.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub organization: String,

    /// Environment within the organization.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub environment: String,

    /// Proxy that served the request.
    pub apiproxy: String,

    /// Request path.
    pub request_uri: String,

    /// Request verb.
    pub request_verb: String,

    /// Response status sent to the client.
    pub response_status_code: i32,

    /// Client IP the request arrived from.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub client_ip: String,

    /// When the gateway started receiving the request.
    pub client_received_start_timestamp: i64,

    /// When the gateway finished receiving the request.
    pub client_received_end_timestamp: i64,

    /// When the gateway started sending the response.
    pub client_sent_start_timestamp: i64,

    /// When the gateway finished sending the response.
    pub client_sent_end_timestamp: i64,

    /// Access token presented on the request.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub access_token: String,

    /// Client id of the calling application.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub client_id: String,

    /// Developer app resolved from the credential.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub developer_app: String,

    /// API product the request was attributed to.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub api_product: String,
}

impl Record {
    /// Fill fields the producer left empty from the calling context.
    #[must_use]
    pub fn ensure_fields(mut self, ctx: &AuthContext) -> Self {
        self.record_type = RECORD_TYPE.to_string();
        if self.organization.is_empty() {
            self.organization = ctx.organization.clone();
        }
        if self.environment.is_empty() {
            self.environment = ctx.environment.clone();
        }
        self
    }
}
