// Email templates
//
// Each alert template has a subject part rendered verbatim and an HTML body
// part rendered with HTML escaping. Both are registered up front, so a broken
// template is reported when the router is built rather than mid-run.

use crate::Result;
use handlebars::Handlebars;
use serde::Serialize;

/// Named alert templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTemplate {
    /// Fields: domain, expiry, status, time
    Cert,
    /// Fields: url, expected, actual, time
    Healthcheck,
}

impl AlertTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            AlertTemplate::Cert => "alert_cert",
            AlertTemplate::Healthcheck => "alert_healthcheck",
        }
    }
}

/// Rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

const CERT_SUBJECT: &str = "Certificate alert for {{domain}}: {{status}}";

const CERT_BODY: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
    <h2>Certificate problem detected</h2>
    <p>The TLS certificate check for <strong>{{domain}}</strong> reported <strong>{{status}}</strong>.</p>
    <ul>
        <li><strong>Domain:</strong> {{domain}}</li>
        <li><strong>Status:</strong> {{status}}</li>
        <li><strong>Expiry:</strong> {{expiry}}</li>
        <li><strong>Checked at:</strong> {{time}} UTC</li>
    </ul>
    <p style="color: #666; font-size: 12px;">Sent by certwatch</p>
</body>
</html>"#;

const HEALTHCHECK_SUBJECT: &str = "Endpoint {{url}} is unhealthy";

const HEALTHCHECK_BODY: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
    <h2>Healthcheck failed</h2>
    <p><strong>{{url}}</strong> did not answer with the expected status.</p>
    <ul>
        <li><strong>Expected:</strong> {{expected}}</li>
        <li><strong>Actual:</strong> {{actual}}</li>
        <li><strong>Checked at:</strong> {{time}} UTC</li>
    </ul>
    <p style="color: #666; font-size: 12px;">Sent by certwatch</p>
</body>
</html>"#;

/// Registered alert templates
pub struct EmailTemplates {
    subjects: Handlebars<'static>,
    bodies: Handlebars<'static>,
}

impl EmailTemplates {
    /// Register the built-in templates
    pub fn new() -> Result<Self> {
        let mut subjects = Handlebars::new();
        subjects.register_escape_fn(handlebars::no_escape);
        subjects.set_strict_mode(true);

        let mut bodies = Handlebars::new();
        bodies.set_strict_mode(true);

        let templates = [
            (AlertTemplate::Cert, CERT_SUBJECT, CERT_BODY),
            (AlertTemplate::Healthcheck, HEALTHCHECK_SUBJECT, HEALTHCHECK_BODY),
        ];

        for (template, subject, body) in templates {
            subjects.register_template_string(template.name(), subject)?;
            bodies.register_template_string(template.name(), body)?;
        }

        Ok(Self { subjects, bodies })
    }

    /// Render subject and body for `template`
    pub fn render<T: Serialize>(&self, template: AlertTemplate, data: &T) -> Result<RenderedEmail> {
        Ok(RenderedEmail {
            subject: self.subjects.render(template.name(), data)?,
            body: self.bodies.render(template.name(), data)?,
        })
    }
}
