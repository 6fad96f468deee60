pub use schoolhub_models::mfa::*;
