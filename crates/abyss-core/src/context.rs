//! Execution Context: the capability record injected into every evaluation.
//!
//! One context is built per invocation and never mutated afterwards. The
//! only outward effect it can produce is a send on the reply channel.
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::OutboundMessage;

/// A chat identity (the invoker, or the bot itself)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID {})", self.name, self.id)
    }
}

/// RGB accent colour used to style reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const DEFAULT: Color = Color(0x7289DA);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0 & 0xFF_FFFF)
    }
}

/// Why the collaborator refused an outbound message
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("missing permission to send messages")]
    MissingPermission,
    #[error("reply channel closed")]
    ChannelClosed,
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// `sendMessage(text?, richDocument?)`
pub trait ReplyChannel: Send + Sync {
    fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError>;
}

/// `currentIdentity()`: the bot user the command runs as
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Identity;
}

/// `resolveBrandColor(identity)`
pub trait BrandingProvider: Send + Sync {
    fn brand_color(&self, identity: &Identity) -> Option<Color>;
}

/// The three collaborator capabilities a context is allowed to use
#[derive(Clone)]
pub struct Capabilities {
    pub replies: Arc<dyn ReplyChannel>,
    pub identity: Arc<dyn IdentityProvider>,
    pub branding: Arc<dyn BrandingProvider>,
}

impl Capabilities {
    /// Use one collaborator object for all three capabilities
    pub fn from_collaborator<C>(collaborator: Arc<C>) -> Self
    where
        C: ReplyChannel + IdentityProvider + BrandingProvider + 'static,
    {
        Self {
            replies: collaborator.clone(),
            identity: collaborator.clone(),
            branding: collaborator,
        }
    }
}

/// Serializable view of a context, used as the template root object
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    pub trace_id: String,
    pub invoked_at: DateTime<Utc>,
    pub invoker: Identity,
    pub bot: Identity,
    pub accent: Option<String>,
}

pub struct ExecutionContext {
    pub trace_id: String,
    pub invoked_at: DateTime<Utc>,
    invoker: Identity,
    caps: Capabilities,
}

impl ExecutionContext {
    pub fn new(invoker: Identity, caps: Capabilities) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            invoked_at: Utc::now(),
            invoker,
            caps,
        }
    }

    /// Pin the invocation time (reports use it as their timestamp)
    pub fn with_invoked_at(mut self, invoked_at: DateTime<Utc>) -> Self {
        self.invoked_at = invoked_at;
        self
    }

    /// Fire-and-forget reply. A refused delivery is logged and dropped.
    pub fn emit_reply(&self, text: impl Into<String>) {
        if let Err(err) = self.send(OutboundMessage::text(text)) {
            tracing::warn!(trace_id = %self.trace_id, error = %err, "reply dropped");
        }
    }

    /// Send a prepared message and surface the delivery result
    pub fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        self.caps.replies.send(message)
    }

    pub fn invoker_identity(&self) -> &Identity {
        &self.invoker
    }

    pub fn bot_identity(&self) -> Identity {
        self.caps.identity.current_identity()
    }

    /// Accent colour of the bot, used for report styling
    pub fn branding_accent(&self) -> Option<Color> {
        let bot = self.bot_identity();
        self.caps.branding.brand_color(&bot)
    }

    /// Avatar shown next to the report footer
    pub fn branding_avatar(&self) -> Option<String> {
        self.bot_identity().avatar_url
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            trace_id: self.trace_id.clone(),
            invoked_at: self.invoked_at,
            invoker: self.invoker.clone(),
            bot: self.bot_identity(),
            accent: self.branding_accent().map(|c| c.to_string()),
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("trace_id", &self.trace_id)
            .field("invoked_at", &self.invoked_at)
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}
