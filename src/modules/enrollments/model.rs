use schoolhub_core::Paginated;

pub use schoolhub_models::enrollments::*;

pub type PaginatedEnrollments = Paginated<Enrollment>;
