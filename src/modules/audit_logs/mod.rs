pub mod controller;
pub mod model;
pub mod router;
pub mod service;

pub use router::init_audit_logs_router;
pub use service::AuditService;
