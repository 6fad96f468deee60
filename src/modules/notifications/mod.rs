pub mod controller;
pub mod hub;
pub mod model;
pub mod router;
pub mod service;

pub use hub::NotificationHub;
pub use router::{init_notifications_router, notification_hub_handler};
pub use service::NotificationService;
