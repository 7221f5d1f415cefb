//! Pure transition checks. Every mutating operation runs through one of these
//! functions before anything is persisted or announced; the functions never
//! touch the network and never mutate their inputs.
//!
//! A successful check returns the normalized payload to persist (trimmed
//! strings, canonical UTC datetimes). A failed check returns a [`Denial`]
//! naming exactly what was wrong.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use strum::Display as StrumDisplay;
use thiserror::Error;

use crate::auth::ActorRole;
use crate::errors::WorkflowError;
use crate::lifecycle::{Lifecycle, INQUIRY_STAFF, ORDER_STAFF};
use crate::models::{DispatchInfo, Inquiry, InquiryStatus, OrderStatus, QuotationStatus};

/// Which lifecycle a denial refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
    Inquiry,
    Quotation,
    Order,
}

/// Why a requested transition was refused. The `Display` strings surface to
/// operators unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    /// Target state equals the current state.
    #[error("{entity} is already {state}")]
    AlreadyInState { entity: Entity, state: String },

    /// The transition table has no row from `from` to `to`.
    #[error("{entity} cannot move from {from} to {to}")]
    UnreachableState {
        entity: Entity,
        from: String,
        to: String,
    },

    /// The row exists, but not for this role.
    #[error("role {role} is not authorized to move {entity} from {from} to {to}")]
    RoleNotAuthorized {
        entity: Entity,
        role: ActorRole,
        from: String,
        to: String,
    },

    /// A required payload field is missing or blank after trimming.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("estimated delivery must not be in the past")]
    DeliveryEstimateInPast,

    #[error("delivery estimate can no longer change once the order is {state}")]
    DeliveryLocked { state: String },

    #[error("role {role} is not authorized to update delivery details")]
    DeliveryRoleNotAuthorized { role: ActorRole },

    #[error("quotation already exists")]
    QuotationExists,

    #[error("inquiry is {status}; quotations are drafted while pending")]
    InquiryNotQuotable { status: InquiryStatus },

    #[error("role {role} is not authorized to draft quotations")]
    QuotationRoleNotAuthorized { role: ActorRole },
}

impl From<Denial> for WorkflowError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::QuotationExists => WorkflowError::Conflict(denial.to_string()),
            Denial::MissingField { .. } | Denial::DeliveryEstimateInPast => {
                WorkflowError::ValidationError(denial.to_string())
            }
            _ => WorkflowError::TransitionDenied(denial.to_string()),
        }
    }
}

/// Raw payload accompanying an order status request. Fields that do not apply
/// to the requested row are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderPayload<'a> {
    pub notes: Option<&'a str>,
    pub courier: Option<&'a str>,
    pub tracking_number: Option<&'a str>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Normalized outcome of an allowed order transition.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTransition {
    pub to: OrderStatus,
    pub notes: Option<String>,
    /// Present exactly when `to` is `dispatched`.
    pub dispatch: Option<DispatchInfo>,
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn check_row<S>(entity: Entity, current: S, requested: S, role: ActorRole) -> Result<(), Denial>
where
    S: Lifecycle + Display,
{
    if requested == current {
        return Err(Denial::AlreadyInState {
            entity,
            state: current.to_string(),
        });
    }
    match current.authorized_roles(requested) {
        None => Err(Denial::UnreachableState {
            entity,
            from: current.to_string(),
            to: requested.to_string(),
        }),
        Some(roles) if !roles.contains(&role) => Err(Denial::RoleNotAuthorized {
            entity,
            role,
            from: current.to_string(),
            to: requested.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Check an inquiry status request against the table.
pub fn can_transition_inquiry(
    current: InquiryStatus,
    requested: InquiryStatus,
    role: ActorRole,
) -> Result<InquiryStatus, Denial> {
    check_row(Entity::Inquiry, current, requested, role)?;
    Ok(requested)
}

/// Check a quotation status request against the table.
pub fn can_transition_quotation(
    current: QuotationStatus,
    requested: QuotationStatus,
    role: ActorRole,
) -> Result<QuotationStatus, Denial> {
    check_row(Entity::Quotation, current, requested, role)?;
    Ok(requested)
}

/// Check an order status request against the table and validate the payload
/// the target row requires. Moving to `dispatched` needs a courier and a
/// tracking number; both are trimmed before the emptiness check.
pub fn can_transition_order(
    current: OrderStatus,
    requested: OrderStatus,
    role: ActorRole,
    payload: OrderPayload<'_>,
) -> Result<OrderTransition, Denial> {
    check_row(Entity::Order, current, requested, role)?;

    let dispatch = if requested == OrderStatus::Dispatched {
        let courier = payload
            .courier
            .and_then(non_blank)
            .ok_or(Denial::MissingField { field: "courier" })?;
        let tracking_number = payload.tracking_number.and_then(non_blank).ok_or(
            Denial::MissingField {
                field: "tracking number",
            },
        )?;
        Some(DispatchInfo {
            courier: courier.to_owned(),
            tracking_number: tracking_number.to_owned(),
            estimated_delivery: payload.estimated_delivery,
        })
    } else {
        None
    };

    Ok(OrderTransition {
        to: requested,
        notes: payload.notes.and_then(non_blank).map(str::to_owned),
        dispatch,
    })
}

/// Check a delivery-estimate update. Not a status transition, but guarded the
/// same way: only fulfilment staff, only before the order reaches
/// `ready_for_dispatch`, and the estimate must be now or later.
pub fn can_update_delivery(
    current: OrderStatus,
    role: ActorRole,
    estimated_delivery: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, Denial> {
    if !ORDER_STAFF.contains(&role) {
        return Err(Denial::DeliveryRoleNotAuthorized { role });
    }
    if !current.allows_delivery_update() {
        return Err(Denial::DeliveryLocked {
            state: current.to_string(),
        });
    }
    if estimated_delivery < now {
        return Err(Denial::DeliveryEstimateInPast);
    }
    Ok(estimated_delivery)
}

/// Check whether a quotation may be drafted for `inquiry`. At most one active
/// quotation exists per inquiry, and drafting only makes sense while the
/// inquiry is still pending.
pub fn can_create_quotation(inquiry: &Inquiry, role: ActorRole) -> Result<(), Denial> {
    if !INQUIRY_STAFF.contains(&role) {
        return Err(Denial::QuotationRoleNotAuthorized { role });
    }
    if inquiry.has_quotation() {
        return Err(Denial::QuotationExists);
    }
    if inquiry.status != InquiryStatus::Pending {
        return Err(Denial::InquiryNotQuotable {
            status: inquiry.status,
        });
    }
    Ok(())
}
