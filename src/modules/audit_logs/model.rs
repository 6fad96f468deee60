pub use schoolhub_models::audit::*;

use schoolhub_core::pagination::Paginated;

pub type PaginatedAuditLogs = Paginated<AuditLog>;
