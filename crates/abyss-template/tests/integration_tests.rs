//! Integration tests for abyss-template.
//!
//! Templates run against a real execution context backed by the in-memory
//! collaborator, so reply ordering and delivery failures are observable.

use std::sync::Arc;

use abyss_core::{ExecutionContext, Identity, MemoryCollaborator};
use abyss_template::{TemplateError, TemplateEvaluator};
use chrono::TimeZone;

fn collaborator() -> Arc<MemoryCollaborator> {
    Arc::new(MemoryCollaborator::new(
        Identity::new(1, "abyss").with_avatar("https://cdn/abyss.png"),
    ))
}

fn context(collaborator: &Arc<MemoryCollaborator>) -> Arc<ExecutionContext> {
    Arc::new(collaborator.context_for(Identity::new(42, "ada")))
}

// =============================================================================
// Reply helper
// =============================================================================

#[test]
fn test_two_replies_in_template_order() {
    let collaborator = collaborator();
    let rendered = TemplateEvaluator::new()
        .evaluate(
            r#"{{create_message "a"}}{{create_message "b"}}done"#,
            context(&collaborator),
        )
        .unwrap();

    assert_eq!(rendered.text, "done");
    assert_eq!(collaborator.sent_texts(), vec!["a", "b"]);
}

#[test]
fn test_reply_inside_block() {
    let collaborator = collaborator();
    let rendered = TemplateEvaluator::new()
        .evaluate(
            r#"{{#if invoker}}{{create_message "hello" invoker.name}}yes{{else}}no{{/if}}"#,
            context(&collaborator),
        )
        .unwrap();
    assert_eq!(rendered.text, "yes");
    assert_eq!(collaborator.sent_texts(), vec!["hello ada"]);
}

#[test]
fn test_delivery_failure_does_not_fail_render() {
    let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")).muted());
    let rendered = TemplateEvaluator::new()
        .evaluate(r#"{{create_message "lost"}}still here"#, context(&collaborator))
        .unwrap();
    assert_eq!(rendered.text, "still here");
    assert!(collaborator.sent().is_empty());
}

// =============================================================================
// Data and helpers
// =============================================================================

#[test]
fn test_snapshot_fields() {
    let collaborator = collaborator();
    let when = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let ctx = Arc::new(
        collaborator
            .context_for(Identity::new(42, "ada"))
            .with_invoked_at(when),
    );
    let rendered = TemplateEvaluator::new()
        .evaluate("{{invoker.name}}|{{bot.avatar_url}}|{{accent}}|{{invoked_at}}", ctx)
        .unwrap();
    assert_eq!(rendered.text, "ada|https://cdn/abyss.png|#7289DA|2024-05-01T12:00:00Z");
}

#[test]
fn test_truncate_is_character_safe() {
    let collaborator = collaborator();
    let rendered = TemplateEvaluator::new()
        .evaluate(r#"{{truncate "ééééé" 2}}"#, context(&collaborator))
        .unwrap();
    assert_eq!(rendered.text, "éé...");
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_unknown_helper_is_render_failure() {
    let collaborator = collaborator();
    let err = TemplateEvaluator::new()
        .evaluate("{{no_such_helper 1}}", context(&collaborator))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Render(_)));
    assert!(err.to_string().starts_with("Template failed: "));
}

#[test]
fn test_syntax_error_sends_nothing() {
    let collaborator = collaborator();
    let err = TemplateEvaluator::new()
        .evaluate(r#"{{create_message "x"}}{{oops"#, context(&collaborator))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
    assert!(collaborator.sent().is_empty());
}

#[test]
fn test_self_include_is_refused() {
    let collaborator = collaborator();
    let err = TemplateEvaluator::new()
        .evaluate(r#"{{create_message "x"}}{{> snippet}}"#, context(&collaborator))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
    assert!(collaborator.sent().is_empty());
}
