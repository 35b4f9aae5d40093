//! Prometheus counters served on `/metrics`.
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    commands: IntCounterVec,
    replies: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let commands = IntCounterVec::new(
            Opts::new("abyss_commands_total", "Commands handled, by result"),
            &["command", "result"],
        )?;
        let replies = IntCounterVec::new(
            Opts::new("abyss_replies_total", "Replies emitted while a command ran"),
            &["command"],
        )?;
        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(replies.clone()))?;
        Ok(Self {
            registry,
            commands,
            replies,
        })
    }

    pub fn record(&self, command: &str, result: &str, replies: usize) {
        self.commands.with_label_values(&[command, result]).inc();
        self.replies
            .with_label_values(&[command])
            .inc_by(replies as u64);
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
