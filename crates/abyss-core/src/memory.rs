//! In-memory collaborator: buffers replies instead of delivering them.
//!
//! Hosts without a chat transport (the HTTP API, tests) use it to collect
//! everything an invocation sent, in send order.
use std::sync::{Arc, Mutex};

use crate::context::{
    BrandingProvider, Capabilities, Color, DeliveryError, ExecutionContext, Identity,
    IdentityProvider, ReplyChannel,
};
use crate::message::OutboundMessage;

#[derive(Debug)]
pub struct MemoryCollaborator {
    bot: Identity,
    accent: Option<Color>,
    can_send: bool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemoryCollaborator {
    pub fn new(bot: Identity) -> Self {
        Self {
            bot,
            accent: Some(Color::DEFAULT),
            can_send: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_accent(mut self, accent: Option<Color>) -> Self {
        self.accent = accent;
        self
    }

    /// Refuse every send, like a channel without send permission
    pub fn muted(mut self) -> Self {
        self.can_send = false;
        self
    }

    /// Build a context for `invoker` backed by this collaborator
    pub fn context_for(self: &Arc<Self>, invoker: Identity) -> ExecutionContext {
        ExecutionContext::new(invoker, Capabilities::from_collaborator(self.clone()))
    }

    /// Everything sent so far, oldest first
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Text content of everything sent so far
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| m.content)
            .collect()
    }

    pub fn drain(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

impl ReplyChannel for MemoryCollaborator {
    fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        if !self.can_send {
            return Err(DeliveryError::MissingPermission);
        }
        let mut sent = self.sent.lock().map_err(|_| DeliveryError::ChannelClosed)?;
        sent.push(message);
        Ok(())
    }
}

impl IdentityProvider for MemoryCollaborator {
    fn current_identity(&self) -> Identity {
        self.bot.clone()
    }
}

impl BrandingProvider for MemoryCollaborator {
    fn brand_color(&self, identity: &Identity) -> Option<Color> {
        if identity.id == self.bot.id {
            self.accent
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_in_order() {
        let collab = Arc::new(MemoryCollaborator::new(Identity::new(7, "bot")));
        let ctx = collab.context_for(Identity::new(1, "owner"));
        ctx.emit_reply("a");
        ctx.emit_reply("b");
        assert_eq!(collab.sent_texts(), vec!["a", "b"]);
        assert_eq!(collab.drain().len(), 2);
        assert!(collab.sent().is_empty());
    }

    #[test]
    fn test_muted_refuses() {
        let collab = Arc::new(MemoryCollaborator::new(Identity::new(7, "bot")).muted());
        let ctx = collab.context_for(Identity::new(1, "owner"));
        ctx.emit_reply("lost");
        assert!(collab.sent().is_empty());
    }
}
