use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use schoolhub_config::EmailConfig;
use schoolhub_core::AppError;
use tracing::{info, instrument};

pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, reset_token))]
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        reset_token: &str,
        expires_in_minutes: i64,
    ) -> Result<(), AppError> {
        let reset_link = self.config.reset_link(reset_token);

        let text_body = format!(
            "Hi {to_name},\n\n\
             We received a request to reset your SchoolHub password.\n\n\
             Open this link to choose a new one:\n{reset_link}\n\n\
             The link expires in {expires_in_minutes} minutes and works once.\n\n\
             If you did not ask for this, you can ignore this email.\n"
        );
        let html_body = password_reset_template(to_name, &reset_link, expires_in_minutes);

        self.send_email(to_email, "Reset your SchoolHub password", &text_body, &html_body)
            .await
    }

    #[instrument(skip(self))]
    pub async fn send_password_changed_email(
        &self,
        to_email: &str,
        to_name: &str,
    ) -> Result<(), AppError> {
        let text_body = format!(
            "Hi {to_name},\n\n\
             Your SchoolHub password was just changed and all sessions were signed out.\n\n\
             If this was not you, contact your school administrator immediately.\n"
        );
        let html_body = format!(
            "<p>Hi <strong>{to_name}</strong>,</p>\
             <p>Your SchoolHub password was just changed and all sessions were signed out.</p>\
             <p>If this was not you, contact your school administrator immediately.</p>"
        );

        self.send_email(to_email, "Your SchoolHub password was changed", &text_body, &html_body)
            .await
    }

    #[instrument(skip(self, html_body, text_body))]
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        if !self.config.enabled {
            info!(to = %to_email, subject, "SMTP disabled, email not sent");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| AppError::internal_error(format!("Invalid from email: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| AppError::internal_error(format!("Invalid to email: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::internal_error(format!("Failed to build email: {}", e)))?;

        let mailer = if self.config.smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );

            SmtpTransport::relay(&self.config.smtp_host)
                .map_err(|e| {
                    AppError::internal_error(format!("Failed to create SMTP relay: {}", e))
                })?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        // lettre's SMTP transport blocks
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::internal_error(format!("Task join error: {}", e)))?
            .map_err(|e| AppError::internal_error(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

fn password_reset_template(name: &str, reset_link: &str, expires_in_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="margin: 0; padding: 24px; font-family: Arial, sans-serif; background-color: #f4f4f4;">
    <div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px;">
        <h2 style="margin-top: 0; color: #1f2937;">Password reset</h2>
        <p style="color: #4b5563;">Hi <strong>{name}</strong>,</p>
        <p style="color: #4b5563;">We received a request to reset your SchoolHub password.</p>
        <p style="text-align: center; margin: 32px 0;">
            <a href="{reset_link}" style="padding: 12px 32px; background: #2563eb; color: #ffffff; text-decoration: none; border-radius: 6px;">Choose a new password</a>
        </p>
        <p style="color: #6b7280; font-size: 13px; word-break: break-all;">{reset_link}</p>
        <p style="color: #6b7280; font-size: 13px;">The link expires in {expires_in_minutes} minutes and works once.</p>
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_template_embeds_link_and_expiry() {
        let html = password_reset_template("Ada", "https://app.test/reset-password?token=abc", 60);
        assert!(html.contains("Ada"));
        assert_eq!(html.matches("token=abc").count(), 2);
        assert!(html.contains("60 minutes"));
    }
}
