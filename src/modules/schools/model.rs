use schoolhub_core::Paginated;

pub use schoolhub_models::schools::*;

pub type PaginatedSchools = Paginated<School>;
