//! Wire-facing entity models for the quoting workflow.
//!
//! These are transient copies of what the persistence collaborator returns;
//! the collaborator stays the sole source of truth (callers re-fetch after a
//! transition, they never patch these locally). Field names follow the
//! collaborator's camelCase JSON.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod inquiry;
pub mod order;
pub mod quotation;

pub use inquiry::{Inquiry, InquiryStatus};
pub use order::{DispatchInfo, Order, OrderStatus, PaymentInfo};
pub use quotation::{Quotation, QuotationDraft, QuotationStatus, QuotationUpload};

/// One requested part line on an inquiry, as the customer submitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSpec {
    /// Customer's reference for the part (drawing number etc.), when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_ref: Option<String>,
    pub material: String,
    pub thickness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// A priced part line on a quotation or order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedPart {
    pub part_ref: String,
    pub material: String,
    pub thickness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Always `unit_price * quantity`; recomputed by the pricing module,
    /// never trusted from user input.
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl PricedPart {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Reference to an uploaded file (CAD drawing, quotation PDF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Customer contact details attached to uploads and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
