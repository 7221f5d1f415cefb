//! The transition table: the one place that knows which lifecycle moves are
//! legal and who may trigger them. Every surface (guard, controller, CLI,
//! progress displays) queries this table instead of hard-coding status
//! comparisons.

use crate::auth::ActorRole;
use crate::models::{InquiryStatus, OrderStatus, QuotationStatus};

/// One row of the transition table: a reachable next state and the roles
/// authorized to request the move.
#[derive(Debug, Clone, Copy)]
pub struct Transition<S: 'static> {
    pub to: S,
    pub roles: &'static [ActorRole],
}

/// Staff roles that run the inquiry/quotation desk.
pub const INQUIRY_STAFF: &[ActorRole] =
    &[ActorRole::Backoffice, ActorRole::Subadmin, ActorRole::Admin];
/// Staff roles that run order fulfilment.
pub const ORDER_STAFF: &[ActorRole] = &[ActorRole::Backoffice, ActorRole::Admin];
const CUSTOMER_ONLY: &[ActorRole] = &[ActorRole::Customer];

/// A status enum with a transition table behind it.
///
/// No backward transitions exist anywhere in the tables, and a state with no
/// outgoing rows is terminal.
pub trait Lifecycle: Copy + PartialEq + Sized + 'static {
    /// Rows leaving `self`. Empty for terminal states.
    fn transitions(self) -> &'static [Transition<Self>];

    fn is_terminal(self) -> bool {
        self.transitions().is_empty()
    }

    /// Whether `to` is a listed successor of `self`. Re-applying the current
    /// state is never a successor.
    fn can_reach(self, to: Self) -> bool {
        self.transitions().iter().any(|t| t.to == to)
    }

    /// Roles authorized for the `self -> to` move, or `None` when the move is
    /// not in the table at all.
    fn authorized_roles(self, to: Self) -> Option<&'static [ActorRole]> {
        self.transitions()
            .iter()
            .find(|t| t.to == to)
            .map(|t| t.roles)
    }

    fn role_may(self, to: Self, role: ActorRole) -> bool {
        self.authorized_roles(to)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}

impl Lifecycle for InquiryStatus {
    fn transitions(self) -> &'static [Transition<Self>] {
        match self {
            InquiryStatus::Pending => &[
                Transition {
                    to: InquiryStatus::Quoted,
                    roles: INQUIRY_STAFF,
                },
                Transition {
                    to: InquiryStatus::Rejected,
                    roles: INQUIRY_STAFF,
                },
            ],
            InquiryStatus::Quoted => &[
                Transition {
                    to: InquiryStatus::Accepted,
                    roles: CUSTOMER_ONLY,
                },
                Transition {
                    to: InquiryStatus::Rejected,
                    roles: CUSTOMER_ONLY,
                },
            ],
            // order_created is reached collaborator-side when the paid order
            // is placed; nothing requests it through this table.
            InquiryStatus::Accepted | InquiryStatus::Rejected | InquiryStatus::OrderCreated => &[],
        }
    }
}

impl Lifecycle for QuotationStatus {
    fn transitions(self) -> &'static [Transition<Self>] {
        match self {
            QuotationStatus::Draft => &[Transition {
                to: QuotationStatus::Sent,
                roles: INQUIRY_STAFF,
            }],
            QuotationStatus::Sent => &[
                Transition {
                    to: QuotationStatus::Accepted,
                    roles: CUSTOMER_ONLY,
                },
                Transition {
                    to: QuotationStatus::Rejected,
                    roles: CUSTOMER_ONLY,
                },
            ],
            QuotationStatus::Accepted | QuotationStatus::Rejected => &[],
        }
    }
}

impl Lifecycle for OrderStatus {
    fn transitions(self) -> &'static [Transition<Self>] {
        match self {
            OrderStatus::Pending => &[
                Transition {
                    to: OrderStatus::Confirmed,
                    roles: ORDER_STAFF,
                },
                Transition {
                    to: OrderStatus::Cancelled,
                    roles: ORDER_STAFF,
                },
            ],
            OrderStatus::Confirmed => &[
                Transition {
                    to: OrderStatus::InProduction,
                    roles: ORDER_STAFF,
                },
                Transition {
                    to: OrderStatus::Cancelled,
                    roles: ORDER_STAFF,
                },
            ],
            OrderStatus::InProduction => &[Transition {
                to: OrderStatus::ReadyForDispatch,
                roles: ORDER_STAFF,
            }],
            OrderStatus::ReadyForDispatch => &[Transition {
                to: OrderStatus::Dispatched,
                roles: ORDER_STAFF,
            }],
            OrderStatus::Dispatched => &[Transition {
                to: OrderStatus::Delivered,
                roles: ORDER_STAFF,
            }],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }
}

impl OrderStatus {
    /// States in which staff may set or revise the delivery estimate. Once
    /// the order is ready for dispatch the estimate travels with the dispatch
    /// details instead.
    pub fn allows_delivery_update(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::InProduction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(InquiryStatus::Rejected.is_terminal());
        assert!(InquiryStatus::Accepted.is_terminal());
        assert!(InquiryStatus::OrderCreated.is_terminal());
        assert!(QuotationStatus::Accepted.is_terminal());
        assert!(QuotationStatus::Rejected.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn no_state_lists_itself_as_successor() {
        for status in OrderStatus::iter() {
            assert!(!status.can_reach(status), "{status} reaches itself");
        }
        for status in InquiryStatus::iter() {
            assert!(!status.can_reach(status), "{status} reaches itself");
        }
        for status in QuotationStatus::iter() {
            assert!(!status.can_reach(status), "{status} reaches itself");
        }
    }

    #[test]
    fn order_pipeline_is_forward_only() {
        assert!(OrderStatus::Pending.can_reach(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_reach(OrderStatus::InProduction));
        assert!(OrderStatus::InProduction.can_reach(OrderStatus::ReadyForDispatch));
        assert!(OrderStatus::ReadyForDispatch.can_reach(OrderStatus::Dispatched));
        assert!(OrderStatus::Dispatched.can_reach(OrderStatus::Delivered));

        // No backward edges.
        assert!(!OrderStatus::Confirmed.can_reach(OrderStatus::Pending));
        assert!(!OrderStatus::Dispatched.can_reach(OrderStatus::ReadyForDispatch));
        assert!(!OrderStatus::Delivered.can_reach(OrderStatus::Dispatched));

        // Cancellation closes once production starts.
        assert!(OrderStatus::Pending.can_reach(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_reach(OrderStatus::Cancelled));
        assert!(!OrderStatus::InProduction.can_reach(OrderStatus::Cancelled));
    }

    #[test]
    fn roles_follow_the_table() {
        assert!(InquiryStatus::Pending.role_may(InquiryStatus::Quoted, ActorRole::Backoffice));
        assert!(InquiryStatus::Pending.role_may(InquiryStatus::Quoted, ActorRole::Subadmin));
        assert!(InquiryStatus::Pending.role_may(InquiryStatus::Quoted, ActorRole::Admin));
        assert!(!InquiryStatus::Pending.role_may(InquiryStatus::Quoted, ActorRole::Customer));

        assert!(InquiryStatus::Quoted.role_may(InquiryStatus::Accepted, ActorRole::Customer));
        assert!(!InquiryStatus::Quoted.role_may(InquiryStatus::Accepted, ActorRole::Backoffice));

        assert!(OrderStatus::Pending.role_may(OrderStatus::Confirmed, ActorRole::Admin));
        assert!(!OrderStatus::Pending.role_may(OrderStatus::Confirmed, ActorRole::Subadmin));

        assert!(QuotationStatus::Draft.role_may(QuotationStatus::Sent, ActorRole::Backoffice));
        assert!(!QuotationStatus::Draft.role_may(QuotationStatus::Sent, ActorRole::Customer));
    }

    #[test]
    fn delivery_updates_stop_at_ready_for_dispatch() {
        assert!(OrderStatus::Pending.allows_delivery_update());
        assert!(OrderStatus::Confirmed.allows_delivery_update());
        assert!(OrderStatus::InProduction.allows_delivery_update());
        assert!(!OrderStatus::ReadyForDispatch.allows_delivery_update());
        assert!(!OrderStatus::Dispatched.allows_delivery_update());
        assert!(!OrderStatus::Cancelled.allows_delivery_update());
    }
}
