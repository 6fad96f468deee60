use schoolhub_core::Paginated;

pub use schoolhub_models::assignments::*;

pub type PaginatedAssignments = Paginated<Assignment>;
