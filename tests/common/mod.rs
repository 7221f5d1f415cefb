use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;
use wiremock::MockServer;

use quoteflow::{
    client::HttpPersistenceApi,
    config::WorkflowConfig,
    events::{Event, EventSender},
    services::workflow::WorkflowService,
};

/// Harness standing up a mock collaborator and a workflow service wired to
/// it, with the event channel exposed for assertions.
pub struct TestApp {
    pub server: MockServer,
    pub service: WorkflowService,
    pub events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Same as [`TestApp::new`], but lets the test adjust the config (retry
    /// policy, locking) before the client is built.
    pub async fn with_config(adjust: impl FnOnce(&mut WorkflowConfig)) -> Self {
        let server = MockServer::start().await;

        let mut config = WorkflowConfig {
            api_base_url: format!("{}/api", server.uri()),
            api_token: Some("test-token".to_owned()),
            retry_base_delay_ms: 10,
            ..WorkflowConfig::default()
        };
        adjust(&mut config);

        let api = HttpPersistenceApi::new(&config).expect("client builds against the mock server");
        let (event_tx, events) = mpsc::channel(16);
        let service = WorkflowService::new(
            Arc::new(api),
            Some(Arc::new(EventSender::new(event_tx))),
            config.optimistic_locking,
        );

        Self {
            server,
            service,
            events,
        }
    }
}

/// The collaborator's success envelope with the entity under `key`.
pub fn ok_envelope(key: &str, value: Value) -> Value {
    json!({ "success": true, key: value })
}

/// A reported failure inside a 2xx response.
pub fn fail_envelope(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

pub fn inquiry_json(id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "customerId": Uuid::new_v4(),
        "parts": [
            {
                "partRef": "BRK-100",
                "material": "Zintec",
                "thickness": "1.5",
                "quantity": 10
            }
        ],
        "files": [],
        "status": status,
        "version": 3,
        "createdAt": "2025-06-01T08:00:00Z",
        "updatedAt": "2025-06-02T10:15:00Z"
    })
}

pub fn quotation_json(id: Uuid, inquiry_id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "inquiryId": inquiry_id,
        "parts": [
            {
                "partRef": "BRK-100",
                "material": "Zintec",
                "thickness": "1.5",
                "quantity": 10,
                "unitPrice": "12.50",
                "totalPrice": "125.00"
            }
        ],
        "totalAmount": "125.00",
        "terms": "Standard manufacturing terms apply. Payment required before production begins.",
        "validUntil": "2025-07-01T00:00:00Z",
        "status": status,
        "version": 2,
        "createdAt": "2025-06-01T08:00:00Z"
    })
}

pub fn order_json(id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "customerId": Uuid::new_v4(),
        "parts": [],
        "totalAmount": "840.00",
        "status": status,
        "version": 7,
        "createdAt": "2025-06-01T08:00:00Z"
    })
}
