use schoolhub_core::Paginated;

pub use schoolhub_models::attendance::*;

pub type PaginatedAttendance = Paginated<Attendance>;
