//! Integration tests for the resumable evaluator.
//!
//! Tests cover:
//! - Loops over ranges and comma-separated collections
//! - Suspension on `ask` and resumption at any depth
//! - Scope shadowing across blocks
//! - Event callbacks and the scopes they capture
//! - Content generation through the generator collaborator

mod common;

use common::{evaluator_with, recording_evaluator, run_script, ScriptedGenerator};

use oraculo_core::evaluator::{PendingInput, Status};
use oraculo_core::parser::parse;
use oraculo_core::tokenize;

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Loops
// =============================================================================

#[tokio::test]
async fn test_range_loop_binds_each_value_in_order() {
    let (evaluator, result) = run_script(r#"for i from 1 to 3 { print "${i}" }"#).await;
    assert_eq!(result.console, lines(&["1", "2", "3"]));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_range_bounds_are_floored_and_may_be_empty() {
    let (_, result) = run_script(r#"for i from 1.7 to 3.2 { print "${i}" }"#).await;
    assert_eq!(result.console, lines(&["1", "2", "3"]));

    let (_, result) = run_script(r#"for i from 3 to 1 { print "never" }"#).await;
    assert!(result.console.is_empty());
}

#[tokio::test]
async fn test_collection_loop_trims_items() {
    let (_, result) = run_script(r#"for p in " Mars ,  Venus" { print "${p}" }"#).await;
    assert_eq!(result.console, lines(&["Mars", "Venus"]));
}

#[tokio::test]
async fn test_collection_without_commas_is_one_item() {
    let (_, result) = run_script(r#"for p in "Earth" { print "${p}" }"#).await;
    assert_eq!(result.console, lines(&["Earth"]));

    let (_, result) = run_script(r#"for p in "" { print "never" }"#).await;
    assert!(result.console.is_empty());
}

#[tokio::test]
async fn test_loop_variable_does_not_outlive_loop() {
    let source = r#"
for i from 1 to 2 { print "${i}" }
print "after ${i}"
"#;
    let (_, result) = run_script(source).await;
    assert_eq!(result.console, lines(&["1", "2", "after ${i}"]));
}

// =============================================================================
// Suspension and resumption
// =============================================================================

#[tokio::test]
async fn test_ask_suspends_and_resumes() {
    let mut evaluator = recording_evaluator();
    evaluator.set_program(parse("ask \"Name?\" -> name\nprint \"${name}\"").unwrap());

    let result = evaluator.run().await;
    assert!(result.console.is_empty(), "nothing after ask may run");
    assert_eq!(
        result.pending_input,
        Some(PendingInput {
            variable_name: "name".to_string(),
            question: "Name?".to_string(),
        })
    );
    assert_eq!(evaluator.status(), Status::Suspended);

    evaluator.submit_input("name", "Ada").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["Ada"]));
    assert!(result.pending_input.is_none());
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_statements_before_ask_run_once() {
    let mut evaluator = recording_evaluator();
    let source = "print \"before\"\nask \"Q?\" -> a\nprint \"after ${a}\"";
    evaluator.set_program(parse(source).unwrap());

    assert_eq!(evaluator.run().await.console, lines(&["before"]));
    evaluator.submit_input("a", "1").unwrap();
    assert_eq!(evaluator.run().await.console, lines(&["before", "after 1"]));
}

#[tokio::test]
async fn test_ask_with_trailing_identifier_target() {
    let (_, result) = run_script("ask \"Age?\" age").await;
    assert_eq!(
        result.pending_input,
        Some(PendingInput {
            variable_name: "age".to_string(),
            question: "Age?".to_string(),
        })
    );
}

#[tokio::test]
async fn test_run_while_suspended_returns_snapshot() {
    let (mut evaluator, first) = run_script("print \"x\"\nask \"Q?\" -> q").await;
    let second = evaluator.run().await;
    assert_eq!(first, second);
    assert_eq!(evaluator.status(), Status::Suspended);
}

#[tokio::test]
async fn test_suspension_inside_if_inside_for_resumes_at_same_iteration() {
    let source = r#"
for i from 1 to 3 {
    if i == 2 {
        ask "Pick?" -> pick
        print "picked ${pick} at ${i}"
    }
    print "i=${i}"
}
print "done"
"#;
    let (mut evaluator, result) = run_script(source).await;
    assert_eq!(result.console, lines(&["i=1"]));
    assert_eq!(result.pending_input.unwrap().variable_name, "pick");

    evaluator.submit_input("pick", "x").unwrap();
    let result = evaluator.run().await;
    assert_eq!(
        result.console,
        lines(&["i=1", "picked x at 2", "i=2", "i=3", "done"])
    );
}

#[tokio::test]
async fn test_repeated_suspension_in_loop() {
    let source = "for i from 1 to 2 {\n  ask \"Value?\" -> v\n  print \"${i}:${v}\"\n}";
    let (mut evaluator, _) = run_script(source).await;

    evaluator.submit_input("v", "a").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["1:a"]));
    assert!(result.pending_input.is_some());

    evaluator.submit_input("v", "b").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["1:a", "2:b"]));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_program_without_ask_is_idempotent() {
    let source = r#"
create title "Hello"
for i from 1 to 2 { print "${i}" }
"#;
    let (mut evaluator, first) = run_script(source).await;
    let second = evaluator.run().await;
    assert_eq!(first, second);
    assert!(second.pending_input.is_none());
}

// =============================================================================
// Scopes
// =============================================================================

#[tokio::test]
async fn test_answer_to_ask_inside_block_stays_in_that_block() {
    let source = r#"
if true {
    ask "Q?" -> a
}
print "got ${a}"
"#;
    let (mut evaluator, _) = run_script(source).await;
    evaluator.submit_input("a", "yes").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["got ${a}"]));

    let source = r#"
for i from 1 to 2 {
    ask "Q${i}?" -> a
}
print "after ${a}"
"#;
    let (mut evaluator, _) = run_script(source).await;
    evaluator.submit_input("a", "one").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.pending_input.unwrap().variable_name, "a");
    evaluator.submit_input("a", "two").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["after ${a}"]));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_shadowing_inside_branch_does_not_leak() {
    let source = r#"
ask "Name?" -> name
if true {
    ask "Inner?" -> name
    print "inner ${name}"
}
print "outer ${name}"
"#;
    let (mut evaluator, _) = run_script(source).await;
    evaluator.submit_input("name", "Ada").unwrap();
    evaluator.run().await;
    evaluator.submit_input("name", "Grace").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["inner Grace", "outer Ada"]));
}

#[tokio::test]
async fn test_else_branch_runs_when_condition_false() {
    let (_, result) = run_script(r#"if 0 { print "then" } else { print "else" }"#).await;
    assert_eq!(result.console, lines(&["else"]));
}

// =============================================================================
// Commands
// =============================================================================

#[tokio::test]
async fn test_unknown_command_is_logged_and_skipped() {
    let (evaluator, result) = run_script("foo \"bar\"\nprint \"still\"").await;
    assert_eq!(result.console, lines(&["// unknown command 'foo'", "still"]));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_comparisons_coerce_to_strings() {
    let (_, result) = run_script(r#"if 5 == "5" { print "eq" }"#).await;
    assert_eq!(result.console, lines(&["eq"]));

    let (_, result) = run_script(r#"if "5" > "10" { print "gt" } else { print "le" }"#).await;
    assert_eq!(result.console, lines(&["gt"]));

    let (_, result) = run_script(r#"if 5 > 10 { print "gt" } else { print "le" }"#).await;
    assert_eq!(result.console, lines(&["le"]));
}

#[tokio::test]
async fn test_print_forms() {
    let (_, result) = run_script("print\nprint 3\nprint 2.5\nprint true\nprint \"${nope}\"").await;
    assert_eq!(result.console, lines(&["", "3", "2.5", "true", "${nope}"]));
}

#[tokio::test]
async fn test_create_uses_presenter() {
    let source = "create title \"Hello\"\ncreate button \"Go\"\ncreate \"card\"";
    let (_, result) = run_script(source).await;
    assert_eq!(result.html, lines(&["title:Hello", "button:Go", "card:"]));
    assert!(result.event_handlers.is_empty());
}

#[tokio::test]
async fn test_create_with_html_presenter() {
    let mut evaluator = evaluator_with(ScriptedGenerator::default());
    evaluator.set_program(parse("create title \"A & B\"").unwrap());
    let result = evaluator.run().await;
    assert_eq!(result.html.len(), 1);
    assert!(result.html[0].starts_with("<h1 id=\"oraculo-el-"));
    assert!(result.html[0].ends_with(">A &amp; B</h1>"));
}

#[tokio::test]
async fn test_generated_markup_is_unfenced_and_appended() {
    let generator = ScriptedGenerator::new(["```html\n<p>Hi</p>\n```"]);
    let mut evaluator = evaluator_with(generator.clone());
    evaluator.set_program(parse("ai.craftHtml \"a greeting card\"").unwrap());

    let result = evaluator.run().await;
    assert_eq!(result.html, lines(&["<p>Hi</p>"]));
    assert!(result.console.is_empty());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("a greeting card"));
    assert!(prompts[0].contains("HTML"));
}

#[tokio::test]
async fn test_empty_generation_is_logged() {
    let mut evaluator = evaluator_with(ScriptedGenerator::new(["   "]));
    evaluator.set_program(parse("ai.craftHtml \"x\"\nprint \"next\"").unwrap());

    let result = evaluator.run().await;
    assert!(result.html.is_empty());
    assert_eq!(
        result.console,
        lines(&["// ai.craftHtml: no content generated", "next"])
    );
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_callback_sees_loop_variable_of_its_iteration() {
    let source = r#"
for label in "A,B" {
    create button label -> onClick {
        print "clicked ${label}"
    }
}
"#;
    let (mut evaluator, result) = run_script(source).await;
    assert_eq!(result.html, lines(&["button:A", "button:B"]));
    assert_eq!(result.event_handlers.len(), 2);

    let first = &result.event_handlers[0];
    assert!(first.event_id.starts_with("event-"));
    assert_eq!(first.element_id, "el-1");
    assert_eq!(first.event_type, "onClick");

    let second_id = result.event_handlers[1].event_id.clone();
    let after = evaluator.trigger_event(&second_id).await.unwrap();
    assert_eq!(after.console, lines(&["clicked B"]));
    assert!(after.pending_input.is_none());

    let after = evaluator.trigger_event(&first.event_id).await.unwrap();
    assert_eq!(after.console, lines(&["clicked B", "clicked A"]));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_callback_sees_bindings_made_after_registration() {
    let source = r#"
create button "Go" -> onClick { print "hello ${who}" }
ask "Who?" -> who
"#;
    let (mut evaluator, result) = run_script(source).await;
    let event_id = result.event_handlers[0].event_id.clone();

    evaluator.submit_input("who", "Ada").unwrap();
    evaluator.run().await;

    let result = evaluator.trigger_event(&event_id).await.unwrap();
    assert_eq!(result.console.last().unwrap(), "hello Ada");
}

#[tokio::test]
async fn test_ask_inside_callback_does_not_suspend() {
    let source = "create button \"Go\" -> onClick {\n  ask \"Q?\" -> x\n  print \"after\"\n}";
    let (mut evaluator, result) = run_script(source).await;
    let event_id = result.event_handlers[0].event_id.clone();

    let result = evaluator.trigger_event(&event_id).await.unwrap();
    assert_eq!(
        result.console,
        lines(&["// ask is not available inside event handlers", "after"])
    );
    assert!(result.pending_input.is_none());
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_trigger_while_suspended_keeps_continuation() {
    let source = r#"
create button "Go" -> onClick { print "click" }
ask "Q?" -> q
print "q=${q}"
"#;
    let (mut evaluator, result) = run_script(source).await;
    let event_id = result.event_handlers[0].event_id.clone();

    let clicked = evaluator.trigger_event(&event_id).await.unwrap();
    assert_eq!(clicked.console, lines(&["click"]));
    assert!(clicked.pending_input.is_none());
    assert!(evaluator.pending_input().is_some());

    evaluator.submit_input("q", "1").unwrap();
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["click", "q=1"]));
}

#[tokio::test]
async fn test_callback_error_does_not_fail_evaluator() {
    let (mut evaluator, result) =
        run_script("create button \"Go\" -> onClick { print missing }").await;
    let event_id = result.event_handlers[0].event_id.clone();

    let result = evaluator.trigger_event(&event_id).await.unwrap();
    assert_eq!(result.console.len(), 1);
    assert!(result.console[0].starts_with("// error in event handler"));
    assert!(result.console[0].contains("NameError: 'missing' is not defined"));
    assert_eq!(evaluator.status(), Status::Finished);
}

#[tokio::test]
async fn test_set_program_resets_state() {
    let (mut evaluator, _) =
        run_script("create button \"Go\" -> onClick { print \"x\" }\nprint \"old\"").await;

    evaluator.set_program(parse("print \"new\"").unwrap());
    let result = evaluator.run().await;
    assert_eq!(result.console, lines(&["new"]));
    assert!(result.html.is_empty());
    assert!(result.event_handlers.is_empty());
}

// =============================================================================
// Tokenizer
// =============================================================================

#[test]
fn test_unrecognized_character_reports_position() {
    let err = tokenize("$").unwrap_err();
    assert_eq!((err.ch, err.line, err.column), ('$', 1, 1));

    let err = tokenize("print \"ok\"\n  @").unwrap_err();
    assert_eq!((err.ch, err.line, err.column), ('@', 2, 3));

    assert!(tokenize("print \"$ inside a string is fine\"").is_ok());
}
