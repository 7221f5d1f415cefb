//! HTTP client for the persistence/notification collaborator.
//!
//! Every response arrives in the collaborator's envelope
//! `{"success": bool, "message"?: string, "<entity>": object}`; a `success:
//! false` inside a 2xx is still a failure. The [`PersistenceApi`] trait is the
//! seam the workflow controller talks through, so tests can swap the HTTP
//! implementation for a mock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::errors::WorkflowError;
use crate::models::{
    Inquiry, InquiryStatus, Order, OrderStatus, Quotation, QuotationDraft, QuotationUpload,
};

/// Body of a status-changing PATCH. `expected_version` rides along when
/// optimistic locking is active; the collaborator answers 409 on a mismatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate<S> {
    pub status: S,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

/// Body of `PATCH /orders/{id}/delivery`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUpdate {
    pub estimated_delivery: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

/// Body of `PATCH /orders/{id}/dispatch`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchUpdate {
    pub courier: String,
    pub tracking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

/// Body of `POST /notifications/sms/test`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsTest {
    pub phone_number: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendQuotationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<i64>,
}

/// Operations the collaborator exposes, one per endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    async fn fetch_inquiry(&self, id: Uuid) -> Result<Inquiry, WorkflowError>;
    async fn update_inquiry_status(
        &self,
        id: Uuid,
        update: StatusUpdate<InquiryStatus>,
    ) -> Result<Inquiry, WorkflowError>;
    async fn fetch_quotation(&self, id: Uuid) -> Result<Quotation, WorkflowError>;
    async fn create_quotation(&self, draft: QuotationDraft) -> Result<Quotation, WorkflowError>;
    async fn upload_quotation(&self, upload: QuotationUpload) -> Result<Quotation, WorkflowError>;
    async fn send_quotation(
        &self,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<Quotation, WorkflowError>;
    async fn fetch_order(&self, id: Uuid) -> Result<Order, WorkflowError>;
    async fn list_orders(&self) -> Result<Vec<Order>, WorkflowError>;
    async fn update_order_status(
        &self,
        id: Uuid,
        update: StatusUpdate<OrderStatus>,
    ) -> Result<Order, WorkflowError>;
    async fn update_delivery(&self, id: Uuid, update: DeliveryUpdate)
        -> Result<Order, WorkflowError>;
    async fn dispatch_order(&self, id: Uuid, update: DispatchUpdate)
        -> Result<Order, WorkflowError>;
    /// Fires a test SMS through the collaborator; returns its acknowledgement
    /// message.
    async fn send_test_sms(&self, test: SmsTest) -> Result<String, WorkflowError>;
}

/// Production [`PersistenceApi`] over reqwest.
///
/// Retry behaviour follows the configured policy: with `retry_max_attempts`
/// at 1 (the default) every failure is returned as-is; with more attempts,
/// transport errors and 5xx responses are retried with exponential backoff
/// and, once exhausted, handed back marked retryable. 4xx responses and
/// envelope failures are never retried.
#[derive(Clone)]
pub struct HttpPersistenceApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    max_attempts: u32,
    base_delay: Duration,
}

impl HttpPersistenceApi {
    pub fn new(config: &WorkflowConfig) -> Result<Self, WorkflowError> {
        let mut base_url = Url::parse(&config.api_base_url)
            .map_err(|e| WorkflowError::ValidationError(format!("invalid api_base_url: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                WorkflowError::ExternalApiError(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, WorkflowError> {
        self.base_url.join(path).map_err(|e| {
            WorkflowError::ValidationError(format!("invalid endpoint path {}: {}", path, e))
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Issues the request built by `build`, rebuilding it for every retry
    /// attempt, and unwraps the collaborator envelope.
    async fn run<T, B>(&self, entity_key: &str, build: B) -> Result<T, WorkflowError>
    where
        T: DeserializeOwned,
        B: Fn() -> Result<reqwest::RequestBuilder, WorkflowError>,
    {
        let mut attempt = 1;
        loop {
            let transient = match build()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| WorkflowError::SerializationError(e.to_string()))?;
                        return unwrap_envelope(body, entity_key);
                    }
                    let message = error_message(response).await;
                    let err = match WorkflowError::from_status(status, message) {
                        WorkflowError::NotFound(_) => {
                            WorkflowError::NotFound(not_found_label(entity_key))
                        }
                        other => other,
                    };
                    if !status.is_server_error() {
                        return Err(err);
                    }
                    err
                }
                Err(e) => WorkflowError::network(&e),
            };

            if attempt < self.max_attempts {
                let backoff = self.base_delay * 2_u32.pow(attempt - 1);
                warn!(
                    "{} (attempt {}/{}), retrying in {:?}",
                    transient, attempt, self.max_attempts, backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            return if self.max_attempts > 1 {
                Err(transient.mark_retryable())
            } else {
                Err(transient)
            };
        }
    }
}

#[async_trait]
impl PersistenceApi for HttpPersistenceApi {
    #[instrument(skip(self))]
    async fn fetch_inquiry(&self, id: Uuid) -> Result<Inquiry, WorkflowError> {
        let url = self.endpoint(&format!("inquiries/{}", id))?;
        self.run("inquiry", || {
            Ok(self.authorize(self.client.get(url.clone())))
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_inquiry_status(
        &self,
        id: Uuid,
        update: StatusUpdate<InquiryStatus>,
    ) -> Result<Inquiry, WorkflowError> {
        let url = self.endpoint(&format!("inquiries/{}/status", id))?;
        self.run("inquiry", || {
            Ok(self.authorize(self.client.patch(url.clone())).json(&update))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_quotation(&self, id: Uuid) -> Result<Quotation, WorkflowError> {
        let url = self.endpoint(&format!("quotations/{}", id))?;
        self.run("quotation", || {
            Ok(self.authorize(self.client.get(url.clone())))
        })
        .await
    }

    #[instrument(skip(self, draft))]
    async fn create_quotation(&self, draft: QuotationDraft) -> Result<Quotation, WorkflowError> {
        let url = self.endpoint("quotations")?;
        self.run("quotation", || {
            Ok(self.authorize(self.client.post(url.clone())).json(&draft))
        })
        .await
    }

    #[instrument(skip(self, upload))]
    async fn upload_quotation(&self, upload: QuotationUpload) -> Result<Quotation, WorkflowError> {
        let url = self.endpoint("quotations/upload")?;
        self.run("quotation", || {
            let form = upload_form(&upload)?;
            Ok(self
                .authorize(self.client.post(url.clone()))
                .multipart(form))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn send_quotation(
        &self,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<Quotation, WorkflowError> {
        let url = self.endpoint(&format!("quotations/{}/send", id))?;
        let body = SendQuotationBody { expected_version };
        self.run("quotation", || {
            Ok(self.authorize(self.client.patch(url.clone())).json(&body))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_order(&self, id: Uuid) -> Result<Order, WorkflowError> {
        let url = self.endpoint(&format!("orders/{}", id))?;
        self.run("order", || Ok(self.authorize(self.client.get(url.clone()))))
            .await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, WorkflowError> {
        let url = self.endpoint("orders")?;
        self.run("orders", || {
            Ok(self.authorize(self.client.get(url.clone())))
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_order_status(
        &self,
        id: Uuid,
        update: StatusUpdate<OrderStatus>,
    ) -> Result<Order, WorkflowError> {
        let url = self.endpoint(&format!("orders/{}/status", id))?;
        self.run("order", || {
            Ok(self.authorize(self.client.patch(url.clone())).json(&update))
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_delivery(
        &self,
        id: Uuid,
        update: DeliveryUpdate,
    ) -> Result<Order, WorkflowError> {
        let url = self.endpoint(&format!("orders/{}/delivery", id))?;
        self.run("order", || {
            Ok(self.authorize(self.client.patch(url.clone())).json(&update))
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn dispatch_order(
        &self,
        id: Uuid,
        update: DispatchUpdate,
    ) -> Result<Order, WorkflowError> {
        let url = self.endpoint(&format!("orders/{}/dispatch", id))?;
        self.run("order", || {
            Ok(self.authorize(self.client.patch(url.clone())).json(&update))
        })
        .await
    }

    #[instrument(skip(self, test))]
    async fn send_test_sms(&self, test: SmsTest) -> Result<String, WorkflowError> {
        let url = self.endpoint("notifications/sms/test")?;
        self.run("message", || {
            Ok(self.authorize(self.client.post(url.clone())).json(&test))
        })
        .await
    }
}

fn upload_form(upload: &QuotationUpload) -> Result<multipart::Form, WorkflowError> {
    let pdf = multipart::Part::bytes(upload.pdf_bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str("application/pdf")
        .map_err(|e| WorkflowError::ValidationError(e.to_string()))?;

    let mut form = multipart::Form::new()
        .part("quotationPdf", pdf)
        .text("inquiryId", upload.inquiry_ref.to_string())
        .text("totalAmount", upload.total_amount.to_string())
        .text("terms", upload.terms.clone())
        .text("validUntil", upload.valid_until.to_rfc3339());
    if let Some(customer) = &upload.customer {
        let customer_json = serde_json::to_string(customer)
            .map_err(|e| WorkflowError::SerializationError(e.to_string()))?;
        form = form.text("customerInfo", customer_json);
    }
    if let Some(notes) = &upload.notes {
        form = form.text("notes", notes.clone());
    }
    Ok(form)
}

fn unwrap_envelope<T: DeserializeOwned>(
    body: serde_json::Value,
    entity_key: &str,
) -> Result<T, WorkflowError> {
    let success = body
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if !success {
        let message = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("collaborator reported failure")
            .to_owned();
        return Err(WorkflowError::ExternalApiError(message));
    }
    match body.get(entity_key) {
        Some(entity) => serde_json::from_value(entity.clone())
            .map_err(|e| WorkflowError::SerializationError(e.to_string())),
        None => Err(WorkflowError::SerializationError(format!(
            "response is missing the '{}' field",
            entity_key
        ))),
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        })
}

fn not_found_label(entity_key: &str) -> String {
    let mut chars = entity_key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::from("Resource"),
    }
}
