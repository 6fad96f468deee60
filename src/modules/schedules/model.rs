pub use schoolhub_models::schedules::*;
