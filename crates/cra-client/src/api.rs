//! Contract-service REST client.
//!
//! Every response is wrapped in a `{code, message, data}` envelope; a `code`
//! other than 200 means the call failed even when the HTTP status is 2xx.

use std::sync::Arc;

use cra_core::{Error, Result};
use cra_graph::GraphSource;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ClientContext;
use crate::document::DocumentHandle;

const CODE_OK: i64 = 200;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn into_data(self, fallback: &str) -> Result<Value> {
        if self.code != CODE_OK {
            return Err(Error::Api {
                code: self.code,
                message: self
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            });
        }
        Ok(self.data)
    }
}

/// Contract metadata as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMain {
    pub id: i64,
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub party_a_id: Option<i64>,
    #[serde(default)]
    pub party_b_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// Fields this client does not model, sent back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractMain {
    /// Display label of the lifecycle status code.
    pub fn status_label(&self) -> &'static str {
        match self.status {
            Some(0) => "Draft",
            Some(1) => "Pending Review",
            Some(2) => "In Progress",
            Some(3) => "Completed",
            Some(4) => "Risk Detected",
            _ => "Unknown",
        }
    }

    pub fn display_name(&self) -> String {
        self.contract_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Contract {}", self.id))
    }
}

/// The `/content` record of a contract, normalised at the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContractContent {
    pub content: Option<String>,
    pub plain_text_content: Option<String>,
    /// Stored knowledge graph, whichever alias carried it.
    pub graph: Option<GraphSource>,
    pub fields: Map<String, Value>,
}

impl ContractContent {
    /// Normalise a `data` value. A bare string fills both text fields.
    pub fn from_data(data: Value) -> Option<Self> {
        match data {
            Value::String(text) => Some(Self {
                content: Some(text.clone()),
                plain_text_content: Some(text),
                ..Self::default()
            }),
            Value::Object(fields) => {
                let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
                Some(Self {
                    content: text("content"),
                    plain_text_content: text("plainTextContent"),
                    graph: GraphSource::probe(&fields),
                    fields,
                })
            }
            _ => None,
        }
    }

    /// Displayable text: primary content over the plain-text fallback.
    pub fn text(&self) -> String {
        self.content
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.plain_text_content.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Clone)]
pub struct ContractClient {
    ctx: Arc<ClientContext>,
}

impl ContractClient {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.ctx.config.service_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.ctx.auth.token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn envelope(&self, request: RequestBuilder) -> Result<Envelope> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("status {}: {}", status, body)));
        }
        response
            .json::<Envelope>()
            .await
            .map_err(|e| Error::Decode(format!("invalid response envelope: {}", e)))
    }

    /// `GET /{id}`.
    pub async fn get_contract(&self, contract_id: &str) -> Result<ContractMain> {
        let url = self.url(&format!("/{}", contract_id));
        debug!("Fetching contract {}", url);
        let data = self
            .envelope(self.ctx.http.get(&url))
            .await?
            .into_data("Get contract failed")?;
        serde_json::from_value(data).map_err(|e| Error::Decode(format!("contract metadata: {}", e)))
    }

    /// `GET /{id}/content`. A non-200 envelope means no content yet.
    pub async fn get_full_content(&self, contract_id: &str) -> Result<Option<ContractContent>> {
        let url = self.url(&format!("/{}/content", contract_id));
        debug!("Fetching contract content {}", url);
        let envelope = self.envelope(self.ctx.http.get(&url)).await?;
        match envelope.into_data("Get contract content failed") {
            Ok(data) => Ok(ContractContent::from_data(data)),
            Err(e) => {
                warn!("Failed to fetch contract content: {}", e);
                Ok(None)
            }
        }
    }

    /// `GET /{id}/file` into a local revocable handle. Any failure yields `None`.
    pub async fn fetch_document(&self, contract_id: &str) -> Option<DocumentHandle> {
        let url = self.url(&format!("/{}/file", contract_id));
        let response = match self.authorized(self.ctx.http.get(&url)).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to fetch contract file: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("Contract file unavailable: {}", response.status());
            return None;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to read contract file: {}", e);
                return None;
            }
        };
        match DocumentHandle::create(&bytes, content_type) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to store contract file: {}", e);
                None
            }
        }
    }

    /// `POST /agent/review`. Progress arrives on the review stream.
    pub async fn start_review(&self, contract: &ContractMain) -> Result<ContractMain> {
        let url = self.url("/agent/review");
        let data = self
            .envelope(self.ctx.http.post(&url).json(contract))
            .await?
            .into_data("Review contract failed")?;
        serde_json::from_value(data).map_err(|e| Error::Decode(format!("review response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_code_is_authoritative() {
        let ok: Envelope = serde_json::from_value(json!({"code": 200, "data": 1})).unwrap();
        assert_eq!(ok.into_data("x").unwrap(), json!(1));

        let failed: Envelope =
            serde_json::from_value(json!({"code": 500, "message": "", "data": null})).unwrap();
        match failed.into_data("Get contract failed") {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "Get contract failed");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_contract_main_round_trips_unknown_fields() {
        let raw = json!({
            "id": 7,
            "contractName": "Lease",
            "status": 4,
            "createTime": "2024-01-01",
            "tenantId": "t-1"
        });
        let contract: ContractMain = serde_json::from_value(raw).unwrap();
        assert_eq!(contract.status_label(), "Risk Detected");
        assert_eq!(contract.display_name(), "Lease");
        assert_eq!(contract.extra["tenantId"], "t-1");

        let back = serde_json::to_value(&contract).unwrap();
        assert_eq!(back["tenantId"], "t-1");
        assert_eq!(back["contractName"], "Lease");
    }

    #[test]
    fn test_content_normalisation() {
        let wrapped = ContractContent::from_data(json!("# Body")).unwrap();
        assert_eq!(wrapped.content.as_deref(), Some("# Body"));
        assert_eq!(wrapped.plain_text_content.as_deref(), Some("# Body"));
        assert!(wrapped.graph.is_none());

        let record = ContractContent::from_data(json!({
            "content": "",
            "plainTextContent": "plain",
            "knowledge_graph_json": "{\"edges\": []}"
        }))
        .unwrap();
        assert_eq!(record.text(), "plain");
        assert_eq!(
            record.graph,
            Some(GraphSource::Encoded("{\"edges\": []}".into()))
        );

        assert!(ContractContent::from_data(Value::Null).is_none());
    }
}
