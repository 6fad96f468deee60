use schoolhub_core::Paginated;

pub use schoolhub_models::courses::*;

pub type PaginatedCourses = Paginated<Course>;
