mod support;

use std::sync::Arc;
use std::time::Duration;

use agent_chat::agent_provider::{PartEvent, ResponsePart, ToolEvent};
use agent_chat::session_store::{KvStore, MemoryStore};
use agent_chat::{DisplayRole, RenderEvent, SessionCoordinator, SessionError};
use agent_provider_mock::{ScriptStep, ScriptedRuntime};
use pretty_assertions::assert_eq;
use serde_json::json;

use support::{config_with, drain, echo_config, scripted_agent, tokio_runtime, FlakyStore, DAY};

fn submit_and_drain(coordinator: &mut SessionCoordinator, ui_session: &str, input: &str) {
    let stream = coordinator
        .submit(ui_session, input)
        .expect("submit should start a run")
        .expect("non-blank input should produce a stream");
    drain(stream).expect("run should succeed");
}

#[test]
fn blank_input_is_ignored_and_unknown_sessions_are_rejected() {
    let tokio = tokio_runtime();
    let mut coordinator =
        SessionCoordinator::new(echo_config(&["Agent"]), None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    assert!(coordinator.submit("ui", "   ").expect("blank is fine").is_none());
    assert!(matches!(
        coordinator.submit("nope", "hi"),
        Err(SessionError::UnknownSession(id)) if id == "nope"
    ));
    assert!(matches!(
        coordinator.clear("nope"),
        Err(SessionError::UnknownSession(_))
    ));
}

#[test]
fn submit_trims_input_and_commits_exchange() {
    let tokio = tokio_runtime();
    let runtime = Arc::new(ScriptedRuntime::new());
    let config = config_with(vec![agent_chat::AgentConfig::new(runtime.clone())]);
    let mut coordinator = SessionCoordinator::new(config, None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    submit_and_drain(&mut coordinator, "ui", "  hello  ");

    assert_eq!(runtime.observed_runs()[0].prompt, "hello");
    let chat = coordinator.session("ui").expect("session");
    let agent = chat.current_agent();
    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.display_messages().len(), 2);
    assert_eq!(agent.display_messages()[0].role(), DisplayRole::User);
    assert_eq!(agent.display_messages()[1].text(), "You said: hello");
    assert!(!chat.widgets_locked());
}

#[test]
fn clear_empties_five_entries_and_resets_usage() {
    let tokio = tokio_runtime();
    let runtime = ScriptedRuntime::with_turns(vec![
        vec![ScriptStep::Model(vec![PartEvent::text_start(0, "hi")])],
        vec![
            ScriptStep::Model(vec![PartEvent::Start {
                index: 0,
                part: ResponsePart::ToolCall {
                    call_id: "c1".to_string(),
                    tool_name: "lookup".to_string(),
                    arguments: json!({ "id": 7 }),
                },
            }]),
            ScriptStep::Tools(vec![ToolEvent::ResultReceived {
                call_id: "c1".to_string(),
                tool_name: "lookup".to_string(),
                content: json!({ "found": true }),
            }]),
        ],
    ]);
    let config = config_with(vec![scripted_agent("Agent", runtime)]);
    let mut coordinator = SessionCoordinator::new(config, None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    submit_and_drain(&mut coordinator, "ui", "one");
    submit_and_drain(&mut coordinator, "ui", "two");
    {
        let agent = coordinator.session("ui").expect("session").current_agent();
        assert_eq!(agent.history().len(), 5);
        assert!(!agent.token_usage().is_zero());
    }

    coordinator.clear("ui").expect("clear");
    let agent = coordinator.session("ui").expect("session").current_agent();
    assert!(agent.history().is_empty());
    assert!(agent.display_messages().is_empty());
    assert!(agent.token_usage().is_zero());
}

#[test]
fn default_settings_translate_each_tool_event_into_one_status() {
    let tokio = tokio_runtime();
    let runtime = ScriptedRuntime::with_turns(vec![vec![
        ScriptStep::Model(vec![
            PartEvent::text_start(0, "Hel"),
            PartEvent::text_delta(0, "lo"),
        ]),
        ScriptStep::Tools(vec![
            ToolEvent::CallStarted {
                call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({ "query": "rust" }),
            },
            ToolEvent::ResultReceived {
                call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                content: json!(["result"]),
            },
        ]),
        ScriptStep::Model(vec![PartEvent::text_start(0, " world")]),
    ]]);
    let config = config_with(vec![scripted_agent("Agent", runtime)]);
    let mut coordinator = SessionCoordinator::new(config, None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    let stream = coordinator
        .submit("ui", "hi")
        .expect("submit")
        .expect("stream");
    let events = drain(stream).expect("run succeeds");

    assert_eq!(
        events,
        vec![
            RenderEvent::status("Answering..."),
            RenderEvent::TextDelta("Hel".to_string()),
            RenderEvent::TextDelta("lo".to_string()),
            RenderEvent::status("Calling tool: search"),
            RenderEvent::status("Processing search result"),
            RenderEvent::status("Answering..."),
            RenderEvent::TextDelta(" world".to_string()),
        ]
    );
}

#[test]
fn each_agent_keeps_its_own_conversation() {
    let tokio = tokio_runtime();
    let mut coordinator =
        SessionCoordinator::new(echo_config(&["Echo", "Scholar"]), None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    submit_and_drain(&mut coordinator, "ui", "to echo");
    coordinator.select_agent("ui", "Scholar").expect("select");
    submit_and_drain(&mut coordinator, "ui", "to scholar");
    submit_and_drain(&mut coordinator, "ui", "again");

    let chat = coordinator.session("ui").expect("session");
    assert_eq!(chat.current_agent_name(), "Scholar");
    assert_eq!(chat.agent("Echo").expect("echo").history().len(), 2);
    assert_eq!(chat.agent("Scholar").expect("scholar").history().len(), 4);
    assert!(matches!(
        coordinator.select_agent("ui", "Ghost"),
        Err(SessionError::UnknownAgent(_))
    ));
}

#[test]
fn shared_session_rehydrates_into_another_ui_session_and_counts_visits() {
    let tokio = tokio_runtime();
    let memory = Arc::new(MemoryStore::new());
    let mut coordinator = SessionCoordinator::new(
        echo_config(&["Echo", "Scholar"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );
    coordinator.open("author", None).expect("open");
    coordinator.select_agent("author", "Scholar").expect("select");
    coordinator
        .set_show_function_calls("author", false)
        .expect("toggle");
    submit_and_drain(&mut coordinator, "author", "summarize this");

    let record = coordinator.share("author").expect("share");
    assert_eq!(record.access_count, 0);
    assert_eq!(record.ttl_seconds, DAY);
    assert_eq!(memory.ttl_seconds(&record.key), Some(DAY));

    memory.advance(Duration::from_secs(DAY / 2));
    coordinator
        .open("visitor-1", Some(&record.key))
        .expect("first rehydrate");
    let visitor = coordinator.session("visitor-1").expect("visitor session");
    assert_eq!(visitor.current_agent_name(), "Scholar");
    assert!(!visitor.preferences().show_function_calls);
    assert_eq!(
        visitor.current_agent().history(),
        coordinator
            .session("author")
            .expect("author")
            .current_agent()
            .history()
    );
    assert_eq!(visitor.current_agent().display_messages().len(), 2);
    assert!(visitor.current_agent().token_usage().is_zero());
    assert!(memory
        .remaining(&record.key)
        .is_some_and(|left| left > Duration::from_secs(DAY - 10)));

    coordinator
        .open("visitor-2", Some(&record.key))
        .expect("second rehydrate");
    let raw = memory.get(&record.key).expect("get").expect("record present");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(stored["access_count"], json!(2));
    assert!(stored["last_accessed_at"].is_string());
}

#[test]
fn sharing_unchanged_content_twice_writes_one_record() {
    let tokio = tokio_runtime();
    let memory = Arc::new(MemoryStore::new());
    let mut coordinator = SessionCoordinator::new(
        echo_config(&["Agent"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );
    coordinator.open("a", None).expect("open");
    coordinator.open("b", None).expect("open");
    submit_and_drain(&mut coordinator, "a", "same words");
    submit_and_drain(&mut coordinator, "b", "same words");

    let first = coordinator.share("a").expect("share a");
    let again = coordinator.share("a").expect("share a again");
    let other = coordinator.share("b").expect("share b");

    assert_eq!(first.key, again.key);
    assert_eq!(first.key, other.key);
    assert_eq!(memory.size().expect("size"), 1);
}

#[test]
fn unknown_key_leaves_an_existing_session_unchanged() {
    let tokio = tokio_runtime();
    let memory = Arc::new(MemoryStore::new());
    let mut coordinator = SessionCoordinator::new(
        echo_config(&["A", "B"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );
    coordinator.open("ui", None).expect("open");
    coordinator.select_agent("ui", "B").expect("select");
    submit_and_drain(&mut coordinator, "ui", "keep me");
    coordinator
        .set_show_function_calls("ui", false)
        .expect("toggle");
    let history_before = coordinator
        .session("ui")
        .expect("session")
        .current_agent()
        .history()
        .to_vec();

    let error = coordinator
        .open("ui", Some("0000"))
        .expect_err("unknown key must fail");
    assert!(matches!(&error, SessionError::SessionNotFound { key } if key == "0000"));
    assert!(!error.is_fatal());

    let chat = coordinator.session("ui").expect("session kept");
    assert_eq!(chat.current_agent_name(), "B");
    assert_eq!(chat.current_agent().history(), history_before.as_slice());
    assert_eq!(chat.current_agent().history().len(), 2);
    assert!(!chat.preferences().show_function_calls);
    assert!(chat.agent("A").expect("agent A").history().is_empty());
    assert!(chat.share_enabled());
    assert_eq!(memory.size().expect("size"), 0);
}

#[test]
fn unknown_key_on_first_open_keeps_a_fresh_session() {
    let tokio = tokio_runtime();
    let memory = Arc::new(MemoryStore::new());
    let mut coordinator = SessionCoordinator::new(
        echo_config(&["Agent", "Other"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );

    let error = coordinator
        .open("ui", Some("0000"))
        .expect_err("unknown key must fail");
    assert!(matches!(error, SessionError::SessionNotFound { .. }));

    let chat = coordinator.session("ui").expect("fresh session kept");
    assert_eq!(chat.current_agent_name(), "Agent");
    assert!(chat.current_agent().history().is_empty());
}

#[test]
fn snapshot_for_unconfigured_agent_rejects_startup_without_counting_visit() {
    let tokio = tokio_runtime();
    let memory = Arc::new(MemoryStore::new());

    let mut origin = SessionCoordinator::new(
        echo_config(&["Ghost"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );
    origin.open("ui", None).expect("open");
    submit_and_drain(&mut origin, "ui", "boo");
    let record = origin.share("ui").expect("share");

    let mut local = SessionCoordinator::new(
        echo_config(&["Agent"]),
        Some(memory.clone()),
        tokio.handle().clone(),
    );
    let error = local
        .open("visitor", Some(&record.key))
        .expect_err("binding must fail");
    assert!(matches!(
        &error,
        SessionError::AgentBinding { agent, .. } if agent == "Ghost"
    ));
    assert!(error.is_fatal());
    assert!(local.session("visitor").is_none());

    let raw = memory.get(&record.key).expect("get").expect("present");
    let stored: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(stored["access_count"], json!(0));
}

#[test]
fn sharing_without_store_is_disabled() {
    let tokio = tokio_runtime();
    let mut coordinator =
        SessionCoordinator::new(echo_config(&["Agent"]), None, tokio.handle().clone());
    coordinator.open("ui", None).expect("open");

    assert!(!coordinator.session("ui").expect("session").share_enabled());
    assert!(matches!(
        coordinator.share("ui"),
        Err(SessionError::ShareDisabled)
    ));
    assert!(matches!(
        coordinator.open("ui", Some("abc")),
        Err(SessionError::ShareDisabled)
    ));
}

#[test]
fn unreachable_store_at_open_leaves_sharing_disabled() {
    let tokio = tokio_runtime();
    let store = Arc::new(FlakyStore::new());
    store.fail();
    let mut coordinator =
        SessionCoordinator::new(echo_config(&["Agent"]), Some(store), tokio.handle().clone());

    coordinator.open("ui", None).expect("open still succeeds");
    assert!(!coordinator.session("ui").expect("session").share_enabled());
    submit_and_drain(&mut coordinator, "ui", "chat still works");
}

#[test]
fn store_failure_disables_sharing_but_not_chat() {
    let tokio = tokio_runtime();
    let store = Arc::new(FlakyStore::new());
    let mut coordinator = SessionCoordinator::new(
        echo_config(&["Agent"]),
        Some(store.clone()),
        tokio.handle().clone(),
    );
    coordinator.open("ui", None).expect("open");
    assert!(coordinator.session("ui").expect("session").share_enabled());
    submit_and_drain(&mut coordinator, "ui", "before outage");

    store.fail();
    let error = coordinator.share("ui").expect_err("share must fail");
    assert!(error.is_store_unavailable());
    assert!(!error.notice().is_empty());
    assert!(!coordinator.session("ui").expect("session").share_enabled());
    assert!(matches!(
        coordinator.share("ui"),
        Err(SessionError::ShareDisabled)
    ));

    submit_and_drain(&mut coordinator, "ui", "during outage");
    assert_eq!(
        coordinator
            .session("ui")
            .expect("session")
            .current_agent()
            .history()
            .len(),
        4
    );
    assert_eq!(store.memory().size().expect("size"), 0);
}

#[test]
fn close_drops_the_session_and_ids_are_unique() {
    let tokio = tokio_runtime();
    let mut coordinator =
        SessionCoordinator::new(echo_config(&["Agent"]), None, tokio.handle().clone());
    let first = SessionCoordinator::new_session_id();
    let second = SessionCoordinator::new_session_id();
    assert_ne!(first, second);
    assert_eq!(first.len(), 36);

    coordinator.open(&first, None).expect("open");
    assert!(coordinator.close(&first).is_some());
    assert!(coordinator.session(&first).is_none());
    assert!(coordinator.close(&first).is_none());
}
