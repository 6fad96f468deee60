use schoolhub_core::Paginated;

pub use schoolhub_models::departments::*;

pub type PaginatedDepartments = Paginated<Department>;
