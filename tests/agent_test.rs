//! Agent-level tests: shared history and run serialisation

mod common;

use agentloop::{Agent, Conversation, Orchestrator, OrchestratorEvent, Role, RunOutcome, StaticPrompt, Tools};
use common::{Reply, ScriptedSource, calendar_tools, init_logging, options, tool_block};
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

fn agent(source: Arc<ScriptedSource>, tools: Tools) -> Agent {
    Agent::new(Orchestrator::new(
        options(),
        source,
        Arc::new(tools),
        Arc::new(StaticPrompt::new("You are a calendar assistant.")),
    ))
}

fn transcript(history: &Conversation) -> Vec<(Role, String)> {
    history
        .messages()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

/// Read events until the first response chunk arrives.
async fn first_chunk(run: &mut agentloop::RunHandle) -> String {
    while let Some(event) = run.events().next().await {
        if let OrchestratorEvent::ResponseChunk(text) = event {
            return text;
        }
    }
    panic!("run ended before streaming any text");
}

#[tokio::test]
async fn test_submit_and_wait() {
    init_logging();

    let source = ScriptedSource::new(vec![Reply::text(&["Nothing ", "today."])]);
    let agent = agent(source.clone(), Tools::new());

    let run = agent.submit("Anything on today?").await;
    let outcome = run.wait().await;

    assert!(matches!(&outcome, RunOutcome::Completed(t) if t == "Nothing today."));
    assert_eq!(
        transcript(&agent.history().await),
        vec![
            (Role::User, "Anything on today?".to_string()),
            (Role::Assistant, "Nothing today.".to_string()),
        ]
    );
    assert!(!agent.is_running().await);
}

#[tokio::test]
async fn test_events_end_with_run() {
    let source = ScriptedSource::new(vec![
        Reply::text(&[&tool_block("calendar_read", json!({"date": "2024-05-02"}))]),
        Reply::text(&["One standup."]),
    ]);
    let journal = Arc::new(Mutex::new(Vec::new()));
    let agent = agent(source, calendar_tools(journal.clone()));

    let mut run = agent.submit("What about Thursday?").await;
    let mut events = Vec::new();
    while let Some(event) = run.events().next().await {
        events.push(event);
    }

    assert!(events.contains(&OrchestratorEvent::ToolCall("calendar_read".into())));
    assert_eq!(
        events.last(),
        Some(&OrchestratorEvent::ResponseReplace("One standup.".into()))
    );
    assert!(matches!(run.wait().await, RunOutcome::Completed(_)));
    assert_eq!(*journal.lock().unwrap(), vec!["calendar_read:2024-05-02"]);

    // History is written back before the event stream closes.
    let history = agent.history().await;
    assert_eq!(history.len(), 5);
    assert_eq!(
        history.messages().last().map(|m| m.content.as_str()),
        Some("One standup.")
    );
}

#[tokio::test]
async fn test_resubmission_cancels_active_run() {
    init_logging();

    let source = ScriptedSource::new(vec![
        Reply::ChunksThenHang(vec!["Let me think".into()]),
        Reply::text(&["Sure, done."]),
    ]);
    let agent = agent(source.clone(), Tools::new());

    let mut first = agent.submit("first question").await;
    assert_eq!(first_chunk(&mut first).await, "Let me think");
    assert!(agent.is_running().await);

    let second = agent.submit("second question").await;

    // The first run was stopped before the second started.
    let (mut first_events, first_outcome) = first.into_parts();
    let leftover = timeout(Duration::from_secs(1), async {
        let mut rest = Vec::new();
        while let Some(event) = first_events.next().await {
            rest.push(event);
        }
        rest
    })
    .await
    .expect("first run's events should have ended");
    assert!(
        !leftover
            .iter()
            .any(|e| matches!(e, OrchestratorEvent::ResponseReplace(_)))
    );
    assert!(first_outcome.await.unwrap().is_cancelled());

    let outcome = second.wait().await;
    assert!(matches!(&outcome, RunOutcome::Completed(t) if t == "Sure, done."));
    assert_eq!(
        transcript(&agent.history().await),
        vec![
            (Role::User, "first question".to_string()),
            (Role::User, "second question".to_string()),
            (Role::Assistant, "Sure, done.".to_string()),
        ]
    );
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test]
async fn test_cancel_leaves_user_message_only() {
    let source = ScriptedSource::new(vec![Reply::ChunksThenHang(vec!["Partial".into()])]);
    let agent = agent(source, Tools::new());

    let mut run = agent.submit("slow question").await;
    first_chunk(&mut run).await;
    agent.cancel().await;

    let outcome = timeout(Duration::from_secs(1), run.wait())
        .await
        .expect("cancelled run should end promptly");
    assert!(outcome.is_cancelled());
    assert_eq!(
        transcript(&agent.history().await),
        vec![(Role::User, "slow question".to_string())]
    );
}

#[tokio::test]
async fn test_handle_cancel() {
    let source = ScriptedSource::new(vec![Reply::ChunksThenHang(vec!["..".into()])]);
    let agent = agent(source, Tools::new());

    let mut run = agent.submit("hello").await;
    first_chunk(&mut run).await;
    run.cancel();

    let outcome = timeout(Duration::from_secs(1), run.wait()).await.unwrap();
    assert!(outcome.is_cancelled());
}

#[tokio::test]
async fn test_clear_history_stops_run() {
    let source = ScriptedSource::new(vec![
        Reply::text(&["First answer."]),
        Reply::ChunksThenHang(vec!["Second".into()]),
    ]);
    let agent = agent(source, Tools::new());

    agent.submit("one").await.wait().await;
    assert_eq!(agent.history().await.len(), 2);

    let mut run = agent.submit("two").await;
    first_chunk(&mut run).await;
    agent.clear_history().await;

    assert!(agent.history().await.is_empty());
    assert!(!agent.is_running().await);
    assert!(run.wait().await.is_cancelled());
}

#[tokio::test]
async fn test_failed_run_keeps_history() {
    let source = ScriptedSource::new(vec![Reply::Status(400, "bad request".into())]);
    let agent = agent(source, Tools::new());

    let mut run = agent.submit("hi").await;
    let mut errors = 0;
    while let Some(event) = run.events().next().await {
        if matches!(event, OrchestratorEvent::Error(_)) {
            errors += 1;
        }
    }

    assert_eq!(errors, 1);
    assert!(matches!(run.wait().await, RunOutcome::Failed(_)));
    assert_eq!(
        transcript(&agent.history().await),
        vec![(Role::User, "hi".to_string())]
    );
}

#[tokio::test]
async fn test_resumed_history_is_sent() {
    let mut stored = Conversation::new();
    stored.push_message(Role::User, "My name is Ada.");
    stored.push_message(Role::Assistant, "Nice to meet you, Ada.");

    let source = ScriptedSource::new(vec![Reply::text(&["Ada."])]);
    let agent = Agent::with_history(
        Orchestrator::new(
            options(),
            source.clone(),
            Arc::new(Tools::new()),
            Arc::new(StaticPrompt::new("")),
        ),
        stored,
    );

    agent.submit("What is my name?").await.wait().await;

    let request = &source.requests()[0];
    let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
    // Blank system prompts are left out.
    assert_eq!(
        contents,
        vec!["My name is Ada.", "Nice to meet you, Ada.", "What is my name?"]
    );
    assert_eq!(agent.history().await.len(), 4);
}

#[tokio::test]
async fn test_tool_panic_does_not_end_run() {
    let source = ScriptedSource::new(vec![
        Reply::text(&[&tool_block("calendar_wipe", json!({}))]),
        Reply::text(&["That did not work."]),
    ]);
    let tools = Tools::new()
        .with(agentloop::tool("calendar_wipe", "Delete every event").build(|_| async move {
            if true {
                panic!("refusing to wipe");
            }
            Ok(json!({}))
        }))
        .unwrap();
    let agent = agent(source, tools);

    let outcome = agent.submit("Clear my calendar").await.wait().await;

    assert!(matches!(&outcome, RunOutcome::Completed(t) if t == "That did not work."));
    let history = agent.history().await;
    assert!(history.messages().any(|m| m.content == "Tool 'calendar_wipe' failed: panicked: refusing to wipe"));
    assert_eq!(
        history.messages().last().map(|m| m.content.as_str()),
        Some("That did not work.")
    );
}
