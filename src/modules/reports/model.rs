pub use schoolhub_models::reports::*;
