use schoolhub_core::Paginated;

pub use schoolhub_models::notifications::*;

pub type PaginatedNotifications = Paginated<Notification>;
