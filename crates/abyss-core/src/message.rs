//! Outbound message shapes handed to the collaborator.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Color;

/// A titled, fielded message in the collaborator's rich format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichDocument {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RichDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            fields: Vec::new(),
            footer: None,
            color: None,
            timestamp: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    pub fn with_footer(mut self, text: impl Into<String>, icon_url: Option<String>) -> Self {
        self.footer = Some(EmbedFooter {
            text: text.into(),
            icon_url,
        });
        self
    }

    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Field lookup by name, mostly for assertions and logging
    pub fn field(&self, name: &str) -> Option<&EmbedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// What `sendMessage(text?, richDocument?)` accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<RichDocument>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    pub fn rich(embed: RichDocument) -> Self {
        Self {
            content: None,
            embed: Some(embed),
        }
    }
}

/// Outcome of a command handler: a reply to send, a user error, or nothing.
/// Scripts can build one with `respond`/`reject`; the renderer passes it
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ActionResult {
    Ok(OutboundMessage),
    BadRequest(String),
    Empty,
}

impl ActionResult {
    pub fn ok_text(content: impl Into<String>) -> Self {
        ActionResult::Ok(OutboundMessage::text(content))
    }

    /// Message the collaborator should send, if any
    pub fn message(&self) -> Option<OutboundMessage> {
        match self {
            ActionResult::Ok(msg) => Some(msg.clone()),
            ActionResult::BadRequest(reason) => Some(OutboundMessage::text(format!("Error: {}", reason))),
            ActionResult::Empty => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, ActionResult::BadRequest(_))
    }
}
