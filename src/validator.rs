use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use schoolhub_core::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Flattens nested and list errors into `field: message` pairs, e.g.
/// `grades[2].score is invalid`.
fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = match (prefix.is_empty(), field.as_ref()) {
            (_, "__all__") => prefix.to_string(),
            (true, f) => f.to_string(),
            (false, f) => format!("{prefix}.{f}"),
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(match &error.message {
                        Some(msg) => msg.to_string(),
                        None if path.is_empty() => "request is invalid".to_string(),
                        None => format!("{path} is invalid"),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

pub fn format_errors(errors: &ValidationErrors) -> String {
    let mut out = Vec::new();
    collect_errors("", errors, &mut out);
    out.sort();
    out.join(", ")
}

/// JSON body that has passed its `validator` rules. Malformed bodies are
/// 400, rule failures 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value
            .validate()
            .map_err(|errors| AppError::unprocessable(anyhow!("{}", format_errors(&errors))))?;

        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request(anyhow!(
            "Missing 'Content-Type: application/json' header"
        ));
    }

    let message = rejection.body_text();

    if let Some(field) = message
        .split("missing field `")
        .nth(1)
        .and_then(|s| s.split('`').next())
    {
        return AppError::bad_request(anyhow!("{} is required", field));
    }

    if message.contains("invalid type") || message.contains("unknown variant") {
        return AppError::bad_request(anyhow!("Invalid field type in request"));
    }

    AppError::bad_request(anyhow!("Invalid request body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode, header};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Validate)]
    struct Item {
        #[validate(range(min = 0.0, max = 100.0))]
        score: f64,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Batch {
        #[validate(length(min = 1), nested)]
        items: Vec<Item>,
        #[validate(email)]
        email: String,
    }

    fn request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let req = request(r#"{"items":[{"score":88}],"email":"a@b.io"}"#);
        let ValidatedJson(batch) = ValidatedJson::<Batch>::from_request(req, &()).await.unwrap();
        assert_eq!(batch.items.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let req = request(r#"{"items":[]}"#);
        let err = ValidatedJson::<Batch>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error.to_string(), "email is required");
    }

    #[tokio::test]
    async fn test_rule_failure_names_nested_path() {
        let req = request(r#"{"items":[{"score":50},{"score":140}],"email":"a@b.io"}"#);
        let err = ValidatedJson::<Batch>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error.to_string(), "items[1].score is invalid");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("{}"))
            .unwrap();
        let err = ValidatedJson::<Batch>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
