use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::ActorRole,
    client::{DeliveryUpdate, DispatchUpdate, PersistenceApi, SmsTest, StatusUpdate},
    errors::WorkflowError,
    events::{Event, EventSender},
    guard::{self, Denial, OrderPayload},
    models::{
        Inquiry, InquiryStatus, Order, OrderStatus, Quotation, QuotationDraft, QuotationStatus,
        QuotationUpload,
    },
    services::pricing,
};

/// Dispatch details captured when an order leaves the floor.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub courier: String,
    pub tracking_number: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Orchestrates every lifecycle operation: fetch the current entity, run the
/// guard against it, persist through the collaborator, then notify.
///
/// Event delivery is advisory. A failed send is logged and the operation still
/// succeeds, because the collaborator has already committed the change.
#[derive(Clone)]
pub struct WorkflowService {
    api: Arc<dyn PersistenceApi>,
    event_sender: Option<Arc<EventSender>>,
    optimistic_locking: bool,
}

impl WorkflowService {
    pub fn new(
        api: Arc<dyn PersistenceApi>,
        event_sender: Option<Arc<EventSender>>,
        optimistic_locking: bool,
    ) -> Self {
        Self {
            api,
            event_sender,
            optimistic_locking,
        }
    }

    /// The version to echo back to the collaborator, or `None` when
    /// optimistic locking is switched off in config.
    fn expected_version(&self, version: Option<i64>) -> Option<i64> {
        if self.optimistic_locking {
            version
        } else {
            None
        }
    }

    #[instrument(skip(self), fields(inquiry_id = %inquiry_id))]
    pub async fn get_inquiry(&self, inquiry_id: Uuid) -> Result<Inquiry, WorkflowError> {
        self.api.fetch_inquiry(inquiry_id).await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, WorkflowError> {
        self.api.fetch_order(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, WorkflowError> {
        self.api.list_orders().await
    }

    /// Moves an inquiry along its lifecycle: `pending -> quoted | rejected`
    /// by staff, `quoted -> accepted | rejected` by the customer.
    #[instrument(skip(self), fields(inquiry_id = %inquiry_id, requested = %requested, role = %role))]
    pub async fn update_inquiry_status(
        &self,
        inquiry_id: Uuid,
        requested: InquiryStatus,
        role: ActorRole,
    ) -> Result<Inquiry, WorkflowError> {
        let inquiry = self.api.fetch_inquiry(inquiry_id).await?;
        let old_status = inquiry.status;
        let status = guard::can_transition_inquiry(old_status, requested, role)?;

        let updated = self
            .api
            .update_inquiry_status(
                inquiry_id,
                StatusUpdate {
                    status,
                    notes: None,
                    expected_version: self.expected_version(inquiry.version),
                },
            )
            .await?;

        info!(
            "Inquiry {} moved from '{}' to '{}'",
            inquiry_id, old_status, updated.status
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::InquiryStatusChanged {
                    inquiry_id,
                    old_status,
                    new_status: updated.status,
                })
                .await
            {
                warn!(error = %e, inquiry_id = %inquiry_id, "Failed to send inquiry status changed event");
            }
        }

        Ok(updated)
    }

    /// Drafts a quotation against a pending inquiry. Refused when the caller
    /// is not staff, when the inquiry already has a quotation, or when the
    /// line items do not price up.
    #[instrument(skip(self, draft), fields(inquiry_id = %inquiry_id, role = %role))]
    pub async fn create_quotation(
        &self,
        inquiry_id: Uuid,
        mut draft: QuotationDraft,
        role: ActorRole,
    ) -> Result<Quotation, WorkflowError> {
        let inquiry = self.api.fetch_inquiry(inquiry_id).await?;
        guard::can_create_quotation(&inquiry, role)?;
        pricing::validate_draft(&draft)?;

        draft.inquiry_ref = inquiry_id;
        let quotation = self.api.create_quotation(draft).await?;

        info!(
            "Quotation {} created for inquiry {}",
            quotation.id, inquiry_id
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::QuotationCreated {
                    quotation_id: quotation.id,
                    inquiry_id,
                })
                .await
            {
                warn!(error = %e, inquiry_id = %inquiry_id, "Failed to send quotation created event");
            }
        }

        Ok(quotation)
    }

    /// Issues a quotation as an uploaded PDF instead of line-item pricing.
    /// Same creation guard as [`create_quotation`](Self::create_quotation),
    /// plus file checks.
    #[instrument(skip(self, upload), fields(inquiry_id = %inquiry_id, role = %role))]
    pub async fn upload_quotation(
        &self,
        inquiry_id: Uuid,
        mut upload: QuotationUpload,
        role: ActorRole,
    ) -> Result<Quotation, WorkflowError> {
        let inquiry = self.api.fetch_inquiry(inquiry_id).await?;
        guard::can_create_quotation(&inquiry, role)?;
        validate_upload(&upload)?;

        upload.inquiry_ref = inquiry_id;
        let quotation = self.api.upload_quotation(upload).await?;

        info!(
            "Quotation {} uploaded for inquiry {}",
            quotation.id, inquiry_id
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::QuotationUploaded {
                    quotation_id: quotation.id,
                    inquiry_id,
                })
                .await
            {
                warn!(error = %e, inquiry_id = %inquiry_id, "Failed to send quotation uploaded event");
            }
        }

        Ok(quotation)
    }

    /// Sends a drafted quotation to the customer (`draft -> sent`).
    #[instrument(skip(self), fields(quotation_id = %quotation_id, role = %role))]
    pub async fn send_quotation(
        &self,
        quotation_id: Uuid,
        role: ActorRole,
    ) -> Result<Quotation, WorkflowError> {
        let quotation = self.api.fetch_quotation(quotation_id).await?;
        guard::can_transition_quotation(quotation.status, QuotationStatus::Sent, role)?;

        let updated = self
            .api
            .send_quotation(quotation_id, self.expected_version(quotation.version))
            .await?;

        info!("Quotation {} sent to the customer", quotation_id);

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::QuotationSent {
                    quotation_id,
                    status: updated.status,
                })
                .await
            {
                warn!(error = %e, quotation_id = %quotation_id, "Failed to send quotation sent event");
            }
        }

        Ok(updated)
    }

    /// Moves an order along the fulfilment pipeline. Dispatching goes through
    /// [`dispatch_order`](Self::dispatch_order) instead, which carries the
    /// courier details the `dispatched` row requires.
    #[instrument(skip(self), fields(order_id = %order_id, requested = %requested, role = %role))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        role: ActorRole,
        notes: Option<String>,
    ) -> Result<Order, WorkflowError> {
        let order = self.api.fetch_order(order_id).await?;
        let old_status = order.status;
        let transition = guard::can_transition_order(
            old_status,
            requested,
            role,
            OrderPayload {
                notes: notes.as_deref(),
                ..OrderPayload::default()
            },
        )?;

        let updated = self
            .api
            .update_order_status(
                order_id,
                StatusUpdate {
                    status: transition.to,
                    notes: transition.notes,
                    expected_version: self.expected_version(order.version),
                },
            )
            .await?;

        info!(
            "Order {} moved from '{}' to '{}'",
            order_id, old_status, updated.status
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status: updated.status,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send order status changed event");
            }
        }

        Ok(updated)
    }

    /// Marks an order dispatched with its courier and tracking number
    /// (`ready_for_dispatch -> dispatched`).
    #[instrument(skip(self, request), fields(order_id = %order_id, role = %role))]
    pub async fn dispatch_order(
        &self,
        order_id: Uuid,
        request: DispatchRequest,
        role: ActorRole,
    ) -> Result<Order, WorkflowError> {
        let order = self.api.fetch_order(order_id).await?;
        let transition = guard::can_transition_order(
            order.status,
            OrderStatus::Dispatched,
            role,
            OrderPayload {
                courier: Some(&request.courier),
                tracking_number: Some(&request.tracking_number),
                estimated_delivery: request.estimated_delivery,
                ..OrderPayload::default()
            },
        )?;
        let dispatch = transition
            .dispatch
            .ok_or(Denial::MissingField { field: "courier" })?;

        let updated = self
            .api
            .dispatch_order(
                order_id,
                DispatchUpdate {
                    courier: dispatch.courier.clone(),
                    tracking_number: dispatch.tracking_number.clone(),
                    estimated_delivery: dispatch.estimated_delivery,
                    expected_version: self.expected_version(order.version),
                },
            )
            .await?;

        info!(
            "Order {} dispatched via {} ({})",
            order_id, dispatch.courier, dispatch.tracking_number
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderDispatched {
                    order_id,
                    courier: dispatch.courier,
                    tracking_number: dispatch.tracking_number,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send order dispatched event");
            }
        }

        Ok(updated)
    }

    /// Records or revises the delivery estimate on an order still in
    /// production. The estimate must not be in the past.
    #[instrument(skip(self), fields(order_id = %order_id, role = %role))]
    pub async fn update_delivery(
        &self,
        order_id: Uuid,
        estimated_delivery: DateTime<Utc>,
        notes: Option<String>,
        role: ActorRole,
    ) -> Result<Order, WorkflowError> {
        let order = self.api.fetch_order(order_id).await?;
        let estimate =
            guard::can_update_delivery(order.status, role, estimated_delivery, Utc::now())?;

        let updated = self
            .api
            .update_delivery(
                order_id,
                DeliveryUpdate {
                    estimated_delivery: estimate,
                    notes: notes.filter(|n| !n.trim().is_empty()),
                    expected_version: self.expected_version(order.version),
                },
            )
            .await?;

        info!(
            "Order {} delivery estimate set to {}",
            order_id, estimate
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::DeliveryUpdated {
                    order_id,
                    estimated_delivery: estimate,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send delivery updated event");
            }
        }

        Ok(updated)
    }

    /// Fires a test SMS through the collaborator and returns its
    /// acknowledgement message.
    #[instrument(skip(self, message))]
    pub async fn send_test_sms(
        &self,
        phone_number: &str,
        message: &str,
    ) -> Result<String, WorkflowError> {
        let phone = phone_number.trim();
        if phone.is_empty() {
            return Err(WorkflowError::ValidationError(
                "phone number is required".into(),
            ));
        }
        let body = message.trim();
        if body.is_empty() {
            return Err(WorkflowError::ValidationError("message is required".into()));
        }

        self.api
            .send_test_sms(SmsTest {
                phone_number: phone.to_owned(),
                message: body.to_owned(),
            })
            .await
    }
}

/// File and amount checks for an uploaded quotation. The messages match what
/// back-office operators already see in the web form.
fn validate_upload(upload: &QuotationUpload) -> Result<(), WorkflowError> {
    if !upload.file_name.to_lowercase().ends_with(".pdf") {
        return Err(WorkflowError::ValidationError(
            "Only PDF files are allowed. Please upload a PDF file.".into(),
        ));
    }
    if upload.pdf_bytes.is_empty() {
        return Err(WorkflowError::ValidationError(
            "Please upload a quotation PDF".into(),
        ));
    }
    if upload.total_amount <= rust_decimal::Decimal::ZERO {
        return Err(WorkflowError::ValidationError(
            "Please enter a valid total amount".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockPersistenceApi;
    use crate::models::PricedPart;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn sample_inquiry(status: InquiryStatus, quotation_ref: Option<Uuid>) -> Inquiry {
        Inquiry {
            id: Uuid::new_v4(),
            customer_ref: Uuid::new_v4(),
            parts: vec![],
            files: vec![],
            status,
            quotation_ref,
            version: Some(3),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn sample_order(status: OrderStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_ref: Uuid::new_v4(),
            parts: vec![],
            total_amount: dec!(900.00),
            status,
            payment: None,
            dispatch: None,
            estimated_delivery: None,
            notes: None,
            version: Some(7),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn sample_quotation(status: QuotationStatus) -> Quotation {
        Quotation {
            id: Uuid::new_v4(),
            inquiry_ref: Uuid::new_v4(),
            parts: vec![],
            total_amount: dec!(450.00),
            terms: "Net 30".into(),
            valid_until: Utc::now() + Duration::days(30),
            status,
            pdf: None,
            version: Some(2),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn priced_part() -> PricedPart {
        PricedPart {
            part_ref: "BRK-100".into(),
            material: "Zintec".into(),
            thickness: "1.5".into(),
            grade: None,
            quantity: 10,
            unit_price: dec!(12.50),
            total_price: dec!(125.00),
            remarks: None,
        }
    }

    fn service(api: MockPersistenceApi) -> WorkflowService {
        WorkflowService::new(Arc::new(api), None, true)
    }

    #[tokio::test]
    async fn confirm_echoes_the_order_version() {
        let order = sample_order(OrderStatus::Pending);
        let id = order.id;
        let mut updated = order.clone();
        updated.status = OrderStatus::Confirmed;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));
        api.expect_update_order_status()
            .withf(|_, update| {
                update.status == OrderStatus::Confirmed && update.expected_version == Some(7)
            })
            .return_once(move |_, _| Ok(updated));

        let result = service(api)
            .update_order_status(id, OrderStatus::Confirmed, ActorRole::Backoffice, None)
            .await
            .unwrap();
        assert_eq!(result.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn locking_off_drops_the_version() {
        let inquiry = sample_inquiry(InquiryStatus::Pending, None);
        let id = inquiry.id;
        let mut updated = inquiry.clone();
        updated.status = InquiryStatus::Quoted;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_inquiry().return_once(move |_| Ok(inquiry));
        api.expect_update_inquiry_status()
            .withf(|_, update| update.expected_version.is_none())
            .return_once(move |_, _| Ok(updated));

        let service = WorkflowService::new(Arc::new(api), None, false);
        service
            .update_inquiry_status(id, InquiryStatus::Quoted, ActorRole::Backoffice)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delivered_orders_refuse_further_moves() {
        let order = sample_order(OrderStatus::Delivered);
        let id = order.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));
        // No update expectation: the guard must stop before any persist call.

        let err = service(api)
            .update_order_status(id, OrderStatus::Cancelled, ActorRole::Admin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TransitionDenied(_)));
    }

    #[tokio::test]
    async fn dispatch_requires_a_courier() {
        let order = sample_order(OrderStatus::ReadyForDispatch);
        let id = order.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));

        let err = service(api)
            .dispatch_order(
                id,
                DispatchRequest {
                    courier: "   ".into(),
                    tracking_number: "TRK-1".into(),
                    estimated_delivery: None,
                },
                ActorRole::Backoffice,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: courier is required"
        );
    }

    #[tokio::test]
    async fn dispatch_trims_courier_details() {
        let order = sample_order(OrderStatus::ReadyForDispatch);
        let id = order.id;
        let mut updated = order.clone();
        updated.status = OrderStatus::Dispatched;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));
        api.expect_dispatch_order()
            .withf(|_, update| update.courier == "DHL" && update.tracking_number == "TRK-99")
            .return_once(move |_, _| Ok(updated));

        service(api)
            .dispatch_order(
                id,
                DispatchRequest {
                    courier: "  DHL  ".into(),
                    tracking_number: " TRK-99 ".into(),
                    estimated_delivery: None,
                },
                ActorRole::Admin,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_quotation_is_a_conflict() {
        let inquiry = sample_inquiry(InquiryStatus::Pending, Some(Uuid::new_v4()));
        let id = inquiry.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_inquiry().return_once(move |_| Ok(inquiry));

        let draft = QuotationDraft {
            inquiry_ref: id,
            parts: vec![priced_part()],
            total_amount: dec!(125.00),
            terms: "Net 30".into(),
            notes: None,
            valid_until: Utc::now() + Duration::days(30),
        };
        let err = service(api)
            .create_quotation(id, draft, ActorRole::Backoffice)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_files() {
        let inquiry = sample_inquiry(InquiryStatus::Pending, None);
        let id = inquiry.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_inquiry().return_once(move |_| Ok(inquiry));

        let upload = QuotationUpload {
            inquiry_ref: id,
            file_name: "quote.docx".into(),
            pdf_bytes: vec![1, 2, 3],
            total_amount: dec!(100.00),
            customer: None,
            terms: "Net 30".into(),
            notes: None,
            valid_until: Utc::now() + Duration::days(30),
        };
        let err = service(api)
            .upload_quotation(id, upload, ActorRole::Admin)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Only PDF files are allowed. Please upload a PDF file."
        );
    }

    #[tokio::test]
    async fn upload_requires_a_positive_total() {
        let inquiry = sample_inquiry(InquiryStatus::Pending, None);
        let id = inquiry.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_inquiry().return_once(move |_| Ok(inquiry));

        let upload = QuotationUpload {
            inquiry_ref: id,
            file_name: "quote.pdf".into(),
            pdf_bytes: vec![1, 2, 3],
            total_amount: dec!(0),
            customer: None,
            terms: "Net 30".into(),
            notes: None,
            valid_until: Utc::now() + Duration::days(30),
        };
        let err = service(api)
            .upload_quotation(id, upload, ActorRole::Admin)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Please enter a valid total amount"
        );
    }

    #[tokio::test]
    async fn resending_a_sent_quotation_is_denied() {
        let quotation = sample_quotation(QuotationStatus::Sent);
        let id = quotation.id;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_quotation()
            .return_once(move |_| Ok(quotation));

        let err = service(api)
            .send_quotation(id, ActorRole::Backoffice)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TransitionDenied(_)));
    }

    #[tokio::test]
    async fn closed_event_channel_does_not_fail_the_operation() {
        let order = sample_order(OrderStatus::Pending);
        let id = order.id;
        let mut updated = order.clone();
        updated.status = OrderStatus::Confirmed;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));
        api.expect_update_order_status()
            .return_once(move |_, _| Ok(updated));

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let service = WorkflowService::new(
            Arc::new(api),
            Some(Arc::new(EventSender::new(tx))),
            true,
        );

        let result = service
            .update_order_status(id, OrderStatus::Confirmed, ActorRole::Backoffice, None)
            .await
            .unwrap();
        assert_eq!(result.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn transitions_publish_status_change_events() {
        let order = sample_order(OrderStatus::Confirmed);
        let id = order.id;
        let mut updated = order.clone();
        updated.status = OrderStatus::InProduction;

        let mut api = MockPersistenceApi::new();
        api.expect_fetch_order().return_once(move |_| Ok(order));
        api.expect_update_order_status()
            .return_once(move |_, _| Ok(updated));

        let (tx, mut rx) = mpsc::channel(4);
        let service = WorkflowService::new(
            Arc::new(api),
            Some(Arc::new(EventSender::new(tx))),
            true,
        );

        service
            .update_order_status(
                id,
                OrderStatus::InProduction,
                ActorRole::Backoffice,
                Some("Production started with estimated delivery time".into()),
            )
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                assert_eq!(order_id, id);
                assert_eq!(old_status, OrderStatus::Confirmed);
                assert_eq!(new_status, OrderStatus::InProduction);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn sms_test_requires_a_phone_number() {
        let api = MockPersistenceApi::new();
        let err = service(api)
            .send_test_sms("   ", "ping")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(_)));
    }
}
