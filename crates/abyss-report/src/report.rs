//! Report document and the size contract of the collaborator.
//!
//! A report is built once and then either shipped as a rich document or
//! collapsed into one plain-text message. The plain form shortens the
//! diagnostics/exception blocks first and the output block second; the
//! input block is never shortened.
use abyss_core::{Color, EvalConfig, OutboundMessage, RichDocument};
use chrono::{DateTime, Utc};

pub const ELLIPSIS: char = '…';
const FENCE: &str = "```";

/// Field and message limits of the chat surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLimits {
    pub field_max_chars: usize,
    pub message_max_chars: usize,
}

impl From<&EvalConfig> for ReportLimits {
    fn from(config: &EvalConfig) -> Self {
        Self {
            field_max_chars: config.field_max_chars,
            message_max_chars: config.message_max_chars,
        }
    }
}

impl Default for ReportLimits {
    fn default() -> Self {
        ReportLimits::from(&EvalConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub description: String,
    /// Fenced snippet
    pub input: String,
    pub output: Option<String>,
    pub diagnostics: Option<String>,
    pub exception: Option<String>,
    pub footer: Option<String>,
    pub footer_icon: Option<String>,
    pub color: Option<Color>,
    pub timestamp: DateTime<Utc>,
    pub use_rich_format: bool,
}

/// A report turned into something sendable
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: OutboundMessage,
    /// Set when even the shortened plain text was over the message limit
    pub hard_cut: bool,
}

impl Report {
    /// Named blocks in display order
    pub fn blocks(&self) -> Vec<(&'static str, &str)> {
        let mut blocks = vec![("Input", self.input.as_str())];
        if let Some(output) = &self.output {
            blocks.push(("Output", output));
        }
        if let Some(diagnostics) = &self.diagnostics {
            blocks.push(("Compilation Errors", diagnostics));
        }
        if let Some(exception) = &self.exception {
            blocks.push(("Exception", exception));
        }
        blocks
    }

    /// Rich format is possible when nothing forced it off and every block
    /// fits in one field
    pub fn is_embeddable(&self, limits: &ReportLimits) -> bool {
        self.use_rich_format
            && self
                .blocks()
                .iter()
                .all(|(_, body)| char_len(body) <= limits.field_max_chars)
    }

    pub fn to_rich(&self) -> RichDocument {
        let mut doc = RichDocument::new(&self.title)
            .with_description(&self.description)
            .with_color(self.color)
            .with_timestamp(self.timestamp);
        for (name, body) in self.blocks() {
            doc = doc.with_field(name, body);
        }
        if let Some(footer) = &self.footer {
            doc = doc.with_footer(footer, self.footer_icon.clone());
        }
        doc
    }

    pub fn to_plain(&self) -> String {
        let mut lines = vec![format!("**{}**", self.title)];
        if !self.description.is_empty() {
            lines.push(self.description.clone());
        }
        for (name, body) in self.blocks() {
            lines.push(format!("**{}**", name));
            lines.push(body.trim_end_matches('\n').to_string());
        }
        if let Some(footer) = &self.footer {
            lines.push(footer.clone());
        }
        lines.join("\n")
    }

    /// Plain text within `max_chars`
    pub fn to_plain_bounded(&self, max_chars: usize) -> (String, bool) {
        let mut report = self.clone();
        let mut text = report.to_plain();

        for slot in [Slot::Diagnostics, Slot::Exception, Slot::Output] {
            let over = char_len(&text).saturating_sub(max_chars);
            if over == 0 {
                return (text, false);
            }
            if let Some(body) = report.slot_mut(slot) {
                // plain text drops trailing newlines, so measure without them
                let trimmed = body.trim_end_matches('\n');
                let keep = char_len(trimmed).saturating_sub(over);
                *body = shorten(trimmed, keep);
                text = report.to_plain();
            }
        }

        if char_len(&text) <= max_chars {
            (text, false)
        } else {
            (shorten_plain(&text, max_chars), true)
        }
    }

    pub fn into_delivery(self, limits: &ReportLimits) -> Delivery {
        if self.is_embeddable(limits) {
            return Delivery {
                message: OutboundMessage::rich(self.to_rich()),
                hard_cut: false,
            };
        }
        let (text, hard_cut) = self.to_plain_bounded(limits.message_max_chars);
        Delivery {
            message: OutboundMessage::text(text),
            hard_cut,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut String> {
        match slot {
            Slot::Diagnostics => self.diagnostics.as_mut(),
            Slot::Exception => self.exception.as_mut(),
            Slot::Output => self.output.as_mut(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Diagnostics,
    Exception,
    Output,
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `s` to exactly `max_chars` characters when it is longer, ending in
/// an ellipsis. A closing code fence survives the cut.
pub fn shorten(s: &str, max_chars: usize) -> String {
    if char_len(s) <= max_chars {
        return s.to_string();
    }
    if s.ends_with(FENCE) && max_chars > FENCE.len() + 1 {
        let mut out: String = s.chars().take(max_chars - FENCE.len() - 1).collect();
        out.push(ELLIPSIS);
        out.push_str(FENCE);
        return out;
    }
    shorten_plain(s, max_chars)
}

/// Hard cut with a trailing ellipsis
pub fn shorten_plain(s: &str, max_chars: usize) -> String {
    if char_len(s) <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> Report {
        Report {
            title: "Scripting Result".into(),
            description: "Scripting failed during stage **Execution**".into(),
            input: "```cs\nboom()```".into(),
            output: None,
            diagnostics: None,
            exception: Some("``ScriptError``: ``bad``".into()),
            footer: Some("Compilation time: 2ms".into()),
            footer_icon: None,
            color: Some(Color::DEFAULT),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            use_rich_format: true,
        }
    }

    #[test]
    fn test_shorten_keeps_fence() {
        let cut = shorten("```cs\nabcdefghij```", 12);
        assert_eq!(char_len(&cut), 12);
        assert_eq!(cut, "```cs\nab…```");
    }

    #[test]
    fn test_shorten_counts_characters() {
        assert_eq!(shorten_plain("ééééé", 3), "éé…");
        assert_eq!(shorten_plain("abc", 3), "abc");
        assert_eq!(shorten_plain("abc", 0), "");
    }

    #[test]
    fn test_rich_field_order() {
        let doc = report().to_rich();
        let names: Vec<_> = doc.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Input", "Exception"]);
        assert_eq!(doc.footer.unwrap().text, "Compilation time: 2ms");
    }

    #[test]
    fn test_long_field_degrades_to_plain() {
        let mut r = report();
        r.exception = Some("x".repeat(30));
        let limits = ReportLimits {
            field_max_chars: 20,
            message_max_chars: 2000,
        };
        assert!(!r.is_embeddable(&limits));
        let delivery = r.into_delivery(&limits);
        assert!(delivery.message.embed.is_none());
        assert!(!delivery.hard_cut);
    }

    #[test]
    fn test_input_is_never_shortened() {
        let mut r = report();
        r.input = format!("```cs\n{}```", "i".repeat(40));
        r.exception = Some("e".repeat(200));
        let full_input = r.input.clone();
        let (text, hard_cut) = r.to_plain_bounded(180);
        assert!(!hard_cut);
        assert!(char_len(&text) <= 180);
        assert!(text.contains(&full_input));
        assert!(text.contains(ELLIPSIS));
    }

    #[test]
    fn test_trailing_newlines_do_not_force_hard_cut() {
        let mut r = report();
        r.exception = None;
        r.diagnostics = Some(format!("{}\n\n", "d".repeat(300)));
        let (text, hard_cut) = r.to_plain_bounded(150);
        assert!(!hard_cut);
        assert_eq!(char_len(&text), 150);
        assert!(text.ends_with("…\nCompilation time: 2ms"));
    }

    #[test]
    fn test_hard_cut_when_input_alone_overflows() {
        let mut r = report();
        r.input = "i".repeat(500);
        let (text, hard_cut) = r.to_plain_bounded(100);
        assert!(hard_cut);
        assert_eq!(char_len(&text), 100);
        assert!(text.ends_with(ELLIPSIS));
    }
}
