use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{FileRef, PartSpec};

/// Lifecycle states of a customer inquiry.
///
/// `OrderCreated` is set by the collaborator once the accepted quotation has
/// been paid and converted; it can be observed here but never requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InquiryStatus {
    Pending,
    Quoted,
    Accepted,
    Rejected,
    OrderCreated,
}

/// A customer-submitted request for a manufacturing quote. Archival record;
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: Uuid,
    #[serde(rename = "customerId")]
    pub customer_ref: Uuid,
    pub parts: Vec<PartSpec>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    pub status: InquiryStatus,
    /// Set once a quotation has been issued against this inquiry.
    #[serde(default, rename = "quotationId", skip_serializing_if = "Option::is_none")]
    pub quotation_ref: Option<Uuid>,
    /// Collaborator revision counter, when it supports optimistic locking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Inquiry {
    /// Whether a quotation already exists for this inquiry. The system allows
    /// at most one, so creation is refused while this holds.
    pub fn has_quotation(&self) -> bool {
        self.quotation_ref.is_some()
    }
}
