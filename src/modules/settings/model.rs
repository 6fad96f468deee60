pub use schoolhub_models::settings::*;
