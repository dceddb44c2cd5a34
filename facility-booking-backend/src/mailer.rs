use facility_booking_config::EmailConfig;
use serde::Serialize;
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("no email api is configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("email api answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Request body of the transactional email api.
#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

pub struct Mailer {
    client: reqwest::Client,
    config: Option<EmailConfig>,
}

impl Mailer {
    #[must_use]
    pub fn new(config: Option<EmailConfig>) -> Self {
        if config.is_none() {
            warn!("no email api configured, invitations and emails will fail");
        }
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let config = self.config.as_ref().ok_or(MailError::NotConfigured)?;
        let response = self
            .client
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .json(&EmailRequest {
                from: &config.sender,
                to: [&email.to],
                subject: &email.subject,
                text: &email.text,
                html: email.html.as_deref(),
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        info!("sent \"{}\" to {}", email.subject, email.to);
        Ok(())
    }
}

#[must_use]
pub fn invitation_email(to: &str, first_name: &str, operator_name: &str, login_url: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_owned(),
        subject: format!("Einladung zu {operator_name}"),
        text: format!(
            "Hallo {first_name},\n\ndu wurdest als Trainer bei {operator_name} eingeladen. Melde \
             dich mit dieser E-Mail-Adresse an, um dein Profil zu vervollständigen:\n\n{login_url}\n"
        ),
        html: None,
    }
}
