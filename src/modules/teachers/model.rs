use schoolhub_core::Paginated;

pub use schoolhub_models::teachers::*;

pub type PaginatedTeachers = Paginated<Teacher>;
