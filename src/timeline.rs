//! Progress derivations over the status enums. Pure and I/O-free; the CLI and
//! any dashboard render from these instead of re-deriving pipeline positions
//! from raw status strings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Inquiry, InquiryStatus, Order, OrderStatus};

/// Standing of one milestone in a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneState {
    Done,
    Current,
    Pending,
}

/// One row of an inquiry's lifecycle timeline.
#[derive(Debug, Clone, Serialize)]
pub struct Milestone {
    pub label: &'static str,
    pub state: MilestoneState,
    /// When the milestone was reached, where the record says.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

/// The milestones an inquiry moves through, oldest first. A rejected inquiry
/// ends at the rejection instead of the remaining pipeline.
///
/// Only the submission time and the most recent move carry timestamps; the
/// collaborator does not keep a full history.
pub fn inquiry_timeline(inquiry: &Inquiry) -> Vec<Milestone> {
    let submitted = Milestone {
        label: "Inquiry submitted",
        state: MilestoneState::Done,
        at: Some(inquiry.created_at),
    };

    if inquiry.status == InquiryStatus::Rejected {
        return vec![
            submitted,
            Milestone {
                label: "Inquiry rejected",
                state: MilestoneState::Done,
                at: inquiry.updated_at,
            },
        ];
    }

    let reached = match inquiry.status {
        InquiryStatus::Pending | InquiryStatus::Rejected => 0,
        InquiryStatus::Quoted => 1,
        InquiryStatus::Accepted => 2,
        InquiryStatus::OrderCreated => 3,
    };

    let mut timeline = vec![submitted];
    for (index, label) in ["Quotation ready", "Quotation accepted", "Order created"]
        .into_iter()
        .enumerate()
    {
        let state = if index < reached {
            MilestoneState::Done
        } else if index == reached {
            MilestoneState::Current
        } else {
            MilestoneState::Pending
        };
        timeline.push(Milestone {
            label,
            state,
            at: (index + 1 == reached)
                .then_some(inquiry.updated_at)
                .flatten(),
        });
    }
    timeline
}

/// Where an order stands in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OrderProgress {
    /// 1-based `step` out of `of` pipeline stages.
    OnTrack { step: usize, of: usize },
    /// Cancelled orders are off the pipeline entirely.
    Cancelled,
}

impl OrderProgress {
    pub fn is_complete(self) -> bool {
        matches!(self, OrderProgress::OnTrack { step, of } if step == of)
    }
}

/// Pipeline position for a status. `cancelled` is reported off-path rather
/// than as a step.
pub fn order_progress(status: OrderStatus) -> OrderProgress {
    let step = match status {
        OrderStatus::Pending => 1,
        OrderStatus::Confirmed => 2,
        OrderStatus::InProduction => 3,
        OrderStatus::ReadyForDispatch => 4,
        OrderStatus::Dispatched => 5,
        OrderStatus::Delivered => 6,
        OrderStatus::Cancelled => return OrderProgress::Cancelled,
    };
    OrderProgress::OnTrack { step, of: 6 }
}

/// Per-status order counts for dashboard headlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStatusSummary {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub in_production: usize,
    pub ready_for_dispatch: usize,
    pub dispatched: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl OrderStatusSummary {
    pub fn tally(orders: &[Order]) -> Self {
        let mut summary = OrderStatusSummary::default();
        for order in orders {
            summary.total += 1;
            match order.status {
                OrderStatus::Pending => summary.pending += 1,
                OrderStatus::Confirmed => summary.confirmed += 1,
                OrderStatus::InProduction => summary.in_production += 1,
                OrderStatus::ReadyForDispatch => summary.ready_for_dispatch += 1,
                OrderStatus::Dispatched => summary.dispatched += 1,
                OrderStatus::Delivered => summary.delivered += 1,
                OrderStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Confirmed => self.confirmed,
            OrderStatus::InProduction => self.in_production,
            OrderStatus::ReadyForDispatch => self.ready_for_dispatch,
            OrderStatus::Dispatched => self.dispatched,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    /// Orders still moving through the pipeline.
    pub fn open(&self) -> usize {
        self.total - self.delivered - self.cancelled
    }
}
