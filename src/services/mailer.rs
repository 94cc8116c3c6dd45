use std::env;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::ServiceError;

const SHARE_SUBJECT: &str = "Velzy Trip Itinerary";

/// Everything the share email template needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareEmail {
    pub to: String,
    pub full_name: String,
    pub city: String,
    pub country: String,
    pub days_count: u32,
    pub link: String,
}

/// Outbound mail collaborator. Fire-and-forget from the store's point of
/// view; the store translates failures before they cross the boundary.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_share(&self, email: &ShareEmail) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

/// Delivers through an HTTP transactional-mail API (Resend-style JSON POST).
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn from_env() -> Result<Self, ServiceError> {
        let api_url = env::var("MAIL_API_URL")
            .map_err(|_| ServiceError::Upstream("MAIL_API_URL not set".to_string()))?;
        let api_key = env::var("MAIL_API_KEY")
            .map_err(|_| ServiceError::Upstream("MAIL_API_KEY not set".to_string()))?;
        let from = env::var("MAIL_FROM")
            .map_err(|_| ServiceError::Upstream("MAIL_FROM not set".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        })
    }
}

fn render_share_html(email: &ShareEmail) -> String {
    format!(
        "<p>{} invited you to view their {}-day trip to {}, {}.</p>\
         <p><a href=\"{}\">Open the itinerary</a></p>",
        email.full_name, email.days_count, email.city, email.country, email.link
    )
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_share(&self, email: &ShareEmail) -> Result<(), ServiceError> {
        let request = SendRequest {
            from: &self.from,
            to: &email.to,
            subject: SHARE_SUBJECT,
            html: render_share_html(email),
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Mail request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "Mail API returned {}",
                response.status()
            )));
        }

        log::info!("Share email sent to {}", email.to);
        Ok(())
    }
}
