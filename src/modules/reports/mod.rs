pub mod controller;
pub mod csv_export;
pub mod model;
pub mod router;
pub mod service;

pub use router::init_reports_router;
pub use service::ReportService;
