use schoolhub_core::Paginated;

pub use schoolhub_models::users::*;

pub type PaginatedUsers = Paginated<User>;
