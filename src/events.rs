//! Workflow events. Controllers emit one event per successful persistence so
//! notification fan-out (email, SMS, webhooks) stays decoupled from the
//! request path; a send failure never fails the operation that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{InquiryStatus, OrderStatus, QuotationStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Everything the workflow announces after a successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InquiryStatusChanged {
        inquiry_id: Uuid,
        old_status: InquiryStatus,
        new_status: InquiryStatus,
    },
    QuotationCreated {
        quotation_id: Uuid,
        inquiry_id: Uuid,
    },
    QuotationUploaded {
        quotation_id: Uuid,
        inquiry_id: Uuid,
    },
    QuotationSent {
        quotation_id: Uuid,
        status: QuotationStatus,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderDispatched {
        order_id: Uuid,
        courier: String,
        tracking_number: String,
    },
    DeliveryUpdated {
        order_id: Uuid,
        estimated_delivery: DateTime<Utc>,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data.
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Handlers implementing this trait process events asynchronously (email/SMS
/// senders, outbound webhooks, audit sinks).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Drain the event channel, logging each event. Binaries spawn this next to
/// the channel; embedders that need real fan-out run their own loop over
/// [`EventHandler`] implementations instead.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::InquiryStatusChanged {
                inquiry_id,
                old_status,
                new_status,
            } => {
                info!(
                    "Inquiry {} moved from {} to {}",
                    inquiry_id, old_status, new_status
                );
            }
            Event::QuotationCreated {
                quotation_id,
                inquiry_id,
            } => {
                info!(
                    "Quotation {} created for inquiry {}",
                    quotation_id, inquiry_id
                );
            }
            Event::QuotationUploaded {
                quotation_id,
                inquiry_id,
            } => {
                info!(
                    "Quotation {} uploaded for inquiry {}",
                    quotation_id, inquiry_id
                );
            }
            Event::QuotationSent { quotation_id, .. } => {
                info!("Quotation {} sent to customer", quotation_id);
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                if *new_status == OrderStatus::Cancelled {
                    warn!("Order {} cancelled (was {})", order_id, old_status);
                } else {
                    info!(
                        "Order {} moved from {} to {}",
                        order_id, old_status, new_status
                    );
                }
            }
            Event::OrderDispatched {
                order_id,
                courier,
                tracking_number,
            } => {
                info!(
                    "Order {} dispatched via {} ({})",
                    order_id, courier, tracking_number
                );
            }
            Event::DeliveryUpdated {
                order_id,
                estimated_delivery,
            } => {
                info!(
                    "Order {} delivery estimate set to {}",
                    order_id, estimated_delivery
                );
            }
            Event::Generic { message, .. } => {
                info!("Event: {}", message);
            }
        }
    }

    warn!("Event processing loop has ended");
}
