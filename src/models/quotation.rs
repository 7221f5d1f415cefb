use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{CustomerInfo, FileRef, PricedPart};

/// Lifecycle states of a quotation. Acceptance/rejection is recorded by the
/// collaborator during the customer's payment flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

/// A priced proposal tied to exactly one inquiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub id: Uuid,
    #[serde(rename = "inquiryId")]
    pub inquiry_ref: Uuid,
    pub parts: Vec<PricedPart>,
    pub total_amount: Decimal,
    pub terms: String,
    pub valid_until: DateTime<Utc>,
    pub status: QuotationStatus,
    /// Present when the quotation was issued as an uploaded PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quotation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

/// Payload for drafting a new quotation against an inquiry. Built and
/// validated by the pricing module, then sent as the creation request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationDraft {
    #[serde(rename = "inquiryId")]
    pub inquiry_ref: Uuid,
    pub parts: Vec<PricedPart>,
    pub total_amount: Decimal,
    pub terms: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub valid_until: DateTime<Utc>,
}

/// Payload for issuing a quotation as an uploaded PDF instead of line-item
/// pricing. Travels as multipart form data, so it carries raw bytes rather
/// than deriving a serialize impl.
#[derive(Debug, Clone)]
pub struct QuotationUpload {
    pub inquiry_ref: Uuid,
    pub file_name: String,
    pub pdf_bytes: Vec<u8>,
    pub total_amount: Decimal,
    pub customer: Option<CustomerInfo>,
    pub terms: String,
    pub notes: Option<String>,
    pub valid_until: DateTime<Utc>,
}
