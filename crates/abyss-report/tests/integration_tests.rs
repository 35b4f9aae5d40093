//! Integration tests for abyss-report: real evaluations rendered into
//! replies.

use std::sync::Arc;

use abyss_core::{
    ActionResult, Color, EvalConfig, ExecutionContext, Identity, MemoryCollaborator,
    OutboundMessage, StagedOutcome,
};
use abyss_report::{classify, ClassifiedResult, ReportRenderer, NO_RESULTS};
use abyss_script::{ScriptEvaluator, Value};
use chrono::TimeZone;

fn context() -> Arc<ExecutionContext> {
    let collaborator = Arc::new(
        MemoryCollaborator::new(Identity::new(1, "abyss").with_avatar("https://cdn/abyss.png"))
            .with_accent(Some(Color::rgb(0x11, 0x22, 0x33))),
    );
    let invoked_at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap();
    Arc::new(
        collaborator
            .context_for(Identity::new(7, "ada"))
            .with_invoked_at(invoked_at),
    )
}

async fn evaluate(src: &str, ctx: &Arc<ExecutionContext>) -> StagedOutcome<Value> {
    ScriptEvaluator::new(EvalConfig::default())
        .evaluate(src, Arc::clone(ctx))
        .await
        .unwrap()
}

fn message(result: ActionResult) -> OutboundMessage {
    match result {
        ActionResult::Ok(message) => message,
        other => panic!("expected a message, got {:?}", other),
    }
}

// =============================================================================
// Scalars
// =============================================================================

#[tokio::test]
async fn test_one_plus_one_is_rich() {
    let ctx = context();
    let outcome = evaluate("1 + 1", &ctx).await;
    let value = match &outcome {
        StagedOutcome::Success { value, .. } => value.as_ref(),
        _ => None,
    };
    assert_eq!(classify(value, 2000), ClassifiedResult::scalar("2"));

    let doc = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, "1 + 1", &ctx))
        .embed
        .unwrap();
    assert_eq!(doc.field("Output").unwrap().value, "```cs\n2```");
    assert_eq!(doc.color, Some(Color::rgb(0x11, 0x22, 0x33)));
    assert_eq!(doc.timestamp, Some(ctx.invoked_at));

    let footer = doc.footer.unwrap().text;
    assert!(footer.starts_with("Compilation time: "));
    assert!(footer.contains(" | Execution time: "));
}

#[tokio::test]
async fn test_statements_only_report_no_results() {
    let ctx = context();
    let outcome = evaluate("var x = 1; x += 1;", &ctx).await;
    let doc = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, "x", &ctx))
        .embed
        .unwrap();
    assert_eq!(doc.field("Output").unwrap().value, NO_RESULTS);
}

// =============================================================================
// Structured values
// =============================================================================

#[tokio::test]
async fn test_map_forces_plain() {
    let ctx = context();
    let src = r#"{"x":1,"y":2}"#;
    let outcome = evaluate(src, &ctx).await;
    let classified = match &outcome {
        StagedOutcome::Success { value, .. } => classify(value.as_ref(), 2000),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(
        classified,
        ClassifiedResult::Mapping {
            type_name: "map".into(),
            entries: vec![("x".into(), "1".into()), ("y".into(), "2".into())],
        }
    );

    let msg = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, src, &ctx));
    assert!(msg.embed.is_none());
    let text = msg.content.unwrap();
    assert!(text.contains("Dictionary of type ``map``\n- ``x``: ``1``\n- ``y``: ``2``"));
    assert!(text.contains(&format!("```cs\n{}```", src)));
}

#[tokio::test]
async fn test_empty_list_is_sequence() {
    let ctx = context();
    let outcome = evaluate("[]", &ctx).await;
    let classified = match &outcome {
        StagedOutcome::Success { value, .. } => classify(value.as_ref(), 2000),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(
        classified,
        ClassifiedResult::Sequence {
            type_name: "list".into(),
            items: vec![],
        }
    );
}

#[tokio::test]
async fn test_identity_is_opaque() {
    let ctx = context();
    let outcome = evaluate("invokerIdentity()", &ctx).await;
    let msg = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, "me", &ctx));
    assert!(msg.embed.is_none());
    assert!(msg.content.unwrap().contains("Object of type ``User``\n- ``ada (ID 7)``"));
}

#[tokio::test]
async fn test_script_response_passes_through() {
    let ctx = context();
    let outcome = evaluate(r#"reject("no thanks")"#, &ctx).await;
    let result = ReportRenderer::new(EvalConfig::default()).render(&outcome, "src", &ctx);
    assert_eq!(result, ActionResult::BadRequest("no thanks".into()));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_missing_expression_report() {
    let ctx = context();
    let src = "int x = ;";
    let outcome = evaluate(src, &ctx).await;
    let doc = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, src, &ctx))
        .embed
        .unwrap();
    assert_eq!(doc.description, "Scripting failed during stage **Compilation**");
    let errors = &doc.field("Compilation Errors").unwrap().value;
    assert!(errors.contains("(Ch 8)"));
    assert!(errors.contains("expression"));
    assert!(doc.field("Output").is_none());
    assert!(doc.field("Exception").is_none());
}

#[tokio::test]
async fn test_runtime_failure_report() {
    let ctx = context();
    let src = "var z = 0; 1 / z";
    let outcome = evaluate(src, &ctx).await;
    let doc = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, src, &ctx))
        .embed
        .unwrap();
    assert_eq!(doc.description, "Scripting failed during stage **Execution**");
    assert!(doc
        .field("Exception")
        .unwrap()
        .value
        .starts_with("``DivideByZeroError``: "));
    assert!(!doc.footer.unwrap().text.contains("Execution time"));
}

#[tokio::test]
async fn test_oversized_output_degrades() {
    let ctx = context();
    let src = r#"var s = ""; foreach (var i in range(300)) { s += "abcdefghij"; } s"#;
    let outcome = evaluate(src, &ctx).await;
    let msg = message(ReportRenderer::new(EvalConfig::default()).render(&outcome, src, &ctx));
    assert!(msg.embed.is_none());
    let text = msg.content.unwrap();
    assert!(text.chars().count() <= 2000);
    assert!(text.contains(src));
    assert!(text.contains('…'));
}

// =============================================================================
// Determinism
// =============================================================================

#[tokio::test]
async fn test_rendering_twice_is_identical() {
    let ctx = context();
    let renderer = ReportRenderer::new(EvalConfig::default());
    for src in ["1 + 1", r#"{"a": [1, 2]}"#, "int x = ;", "throw \"boom\";"] {
        let outcome = evaluate(src, &ctx).await;
        let first = serde_json::to_string(&renderer.render(&outcome, src, &ctx)).unwrap();
        let second = serde_json::to_string(&renderer.render(&outcome, src, &ctx)).unwrap();
        assert_eq!(first, second);
    }
}
