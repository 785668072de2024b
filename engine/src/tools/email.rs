//! Outbound email for CustomMCP agents
//!
//! There is no mail transport: messages are logged and recorded in an
//! in-memory outbox, and the model gets the delivery confirmation it expects.

use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{str_arg, Tool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct SendEmailTool {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl SendEmailTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emails sent through this tool so far
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &'static str {
        "send_email"
    }

    fn description(&self) -> &'static str {
        "Send an email to a recipient."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"to": "someone@example.com", "subject": "Subject", "body": "Message text"}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let to = str_arg(args, "to")?.trim().to_string();
        let subject = args
            .get("subject")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body = args
            .get("body")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        info!(to = %to, subject = %subject, body_len = body.len(), "Sending email");

        let confirmation = format!("Email sent to {} with subject: {}", to, subject);
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(OutgoingEmail { to, subject, body });
        }
        Ok(confirmation)
    }
}
