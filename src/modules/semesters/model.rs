use schoolhub_core::Paginated;

pub use schoolhub_models::semesters::*;

pub type PaginatedSemesters = Paginated<Semester>;
