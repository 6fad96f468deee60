use anyhow::anyhow;
use schoolhub_core::AppError;
use tracing::error;

/// Maps a unique-constraint violation to a 400 with `message`; anything else
/// goes through the usual sqlx conversion.
pub fn unique_violation(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return AppError::bad_request(anyhow!(message));
        }
        error!(error = %e, "Database error");
        AppError::from(e)
    }
}

/// Same as [`unique_violation`] but also turns foreign key failures into a
/// 400, for writes that reference other rows by ID.
pub fn constraint_violation(
    unique_message: &'static str,
) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return AppError::bad_request(anyhow!(unique_message));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::bad_request(anyhow!("Referenced record does not exist"));
            }
            if db_err.is_check_violation() {
                return AppError::bad_request(anyhow!("Value violates a data constraint"));
            }
        }
        error!(error = %e, "Database error");
        AppError::from(e)
    }
}
