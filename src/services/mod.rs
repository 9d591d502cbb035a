//! Services module for business logic and integrations

pub mod comm_log;
pub mod order_store;
pub mod orchestrator;
pub mod reconciler;
pub mod runtime_config;

pub use comm_log::CommLogSink;
pub use orchestrator::{PaymentOrchestrator, SubmitResult};
pub use order_store::OrderStore;
pub use reconciler::{CallbackReconciler, ReconciliationResult};
pub use runtime_config::RuntimeConfigStore;
