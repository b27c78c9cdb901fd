// Email Notifier - Using lettre

use crate::Result;
use crate::inspector::config::EmailConfig;
use crate::notify::{Message, Notifier};
use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

/// SMTP notifier; the recipient comes from each `Message`
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    /// Create new email notifier
    pub fn new(config: EmailConfig) -> Result<Self> {
        // Reject a bad sender address at startup instead of on every alert
        let _: lettre::Address = config.from_address.parse()?;
        Ok(Self { config })
    }

    /// Build the MIME message: plain-text fallback plus the HTML body
    fn build_message(&self, message: &Message) -> Result<lettre::Message> {
        let email = lettre::Message::builder()
            .from(self.config.from_address.parse()?)
            .to(message.to.parse()?)
            .subject(message.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(html_to_text(&message.body)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(message.body.clone()),
                    ),
            )?;

        Ok(email)
    }

    /// Get SMTP transport
    fn get_transport(&self) -> Result<SmtpTransport> {
        let transport = if self.config.use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_server)?
        } else {
            SmtpTransport::relay(&self.config.smtp_server)?
        };

        let transport = if self.config.username.is_empty() {
            transport
        } else {
            transport.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
        };

        Ok(transport.port(self.config.smtp_port).build())
    }
}

/// Crude tag stripper for the text/plain alternative
fn html_to_text(html: &str) -> String {
    let body = match (html.find("<body"), html.rfind("</body>")) {
        (Some(start), Some(end)) if start < end => &html[start..end],
        _ => html,
    };

    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    // The entities handlebars escapes; `&amp;` last so `&amp;lt;` stays `&lt;`
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x60;", "`")
        .replace("&#x3D;", "=")
        .replace("&amp;", "&")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, message: &Message) -> Result<()> {
        let email = self.build_message(message)?;
        let transport = self.get_transport()?;

        // SmtpTransport is blocking
        tokio::task::spawn_blocking(move || transport.send(&email)).await??;

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
