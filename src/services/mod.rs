// Lifecycle orchestration
pub mod workflow;

// Quotation pricing helpers
pub mod pricing;

pub use pricing::PriceSheet;
pub use workflow::{DispatchRequest, WorkflowService};
