use schoolhub_core::Paginated;

pub use schoolhub_models::students::*;

pub type PaginatedStudents = Paginated<Student>;
