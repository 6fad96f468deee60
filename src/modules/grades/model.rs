use schoolhub_core::Paginated;

pub use schoolhub_models::grades::*;

pub type PaginatedGrades = Paginated<Grade>;
