use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_chat::session_store::{KvStore, MemoryStore, UpstashConfig, UpstashStore};
use agent_chat::{
    AgentConfig, AppConfig, AppSettings, ChatSession, DisplayBlock, DisplayRole, RenderEvent,
    SessionCoordinator, SessionError,
};
use agent_provider_mock::ScriptedRuntime;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Line-oriented chat host for local agents.
#[derive(Debug, Parser)]
#[command(name = "agent-chat", version)]
struct Cli {
    /// JSON settings file; overrides AGENT_CHAT_CONFIG_PATH.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UI session identifier; a new one is minted when absent.
    #[arg(long)]
    session_id: Option<String>,

    /// Key of a shared session to restore on startup.
    #[arg(long)]
    shared: Option<String>,

    /// Keep shared sessions in process memory instead of Upstash.
    #[arg(long)]
    memory_store: bool,

    /// Delay between streamed items of the scripted agents, in milliseconds.
    #[arg(long, default_value_t = 15)]
    delay_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => AppSettings::from_path(path),
        None => AppSettings::from_env(),
    }
    .context("failed to load settings")?;
    let config = Arc::new(AppConfig::new(settings, local_agents(cli.delay_ms))?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let store = open_store(cli.memory_store)?;
    let mut coordinator =
        SessionCoordinator::new(Arc::clone(&config), store, runtime.handle().clone());

    let ui_session = cli
        .session_id
        .clone()
        .unwrap_or_else(SessionCoordinator::new_session_id);
    match coordinator.open(&ui_session, cli.shared.as_deref()) {
        Ok(()) => {}
        Err(error) if error.is_fatal() => return Err(error).context("cannot open shared session"),
        Err(error) => eprintln!("! {}", error.notice()),
    }

    if let Some(chat) = coordinator.session(&ui_session) {
        print_header(config.settings(), chat);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read input")?;
        let keep_going = handle_line(&mut coordinator, &ui_session, line.trim());
        if !keep_going {
            break;
        }
    }

    coordinator.close(&ui_session);
    Ok(())
}

fn local_agents(delay_ms: u64) -> Vec<AgentConfig> {
    let delay = Duration::from_millis(delay_ms);
    vec![
        AgentConfig::new(Arc::new(ScriptedRuntime::new().with_item_delay(delay)))
            .with_name("Echo")
            .with_description("Repeats what you say.")
            .with_greeting("Say anything and I will say it back.")
            .with_sidebar(|_| Some("Echo keeps no state between turns.".to_string())),
        AgentConfig::new(Arc::new(
            ScriptedRuntime::new()
                .with_instructions("Answer politely.")
                .with_item_delay(delay)
                .with_model_id("polite-echo"),
        ))
        .with_name("Polite Echo")
        .with_avatars("🎩", "👤"),
    ]
}

fn open_store(memory: bool) -> anyhow::Result<Option<Arc<dyn KvStore>>> {
    if memory {
        return Ok(Some(Arc::new(MemoryStore::new())));
    }
    match UpstashConfig::from_env() {
        Some(upstash) => {
            let store = UpstashStore::new(upstash.with_timeout(Duration::from_secs(10)))
                .context("failed to build Upstash client")?;
            Ok(Some(Arc::new(store)))
        }
        None => Ok(None),
    }
}

fn print_header(settings: &AppSettings, chat: &ChatSession) {
    println!("{} {}", settings.page_icon, settings.page_title);
    println!(
        "commands: /agent NAME, /context on|off, /clear, /share, /history, /sidebar, /quit"
    );
    if !chat.preferences().sidebar_collapsed {
        print_sidebar(chat);
    }
    for message in chat.visible_messages() {
        print_message(chat, message.role(), message.blocks());
    }
    println!("{} {}", chat.current_agent().agent().agent_avatar, chat.greeting());
}

fn print_message(chat: &ChatSession, role: DisplayRole, blocks: &[DisplayBlock]) {
    let agent = chat.current_agent().agent();
    let avatar = match role {
        DisplayRole::User => agent.user_avatar.as_str(),
        DisplayRole::Assistant => agent.agent_avatar.as_str(),
        DisplayRole::Tool => "🛠️",
        DisplayRole::System => "⚙️",
    };
    let show = chat.preferences().show_function_calls;
    for block in blocks.iter().filter(|block| show || block.is_conversational()) {
        match block {
            DisplayBlock::Text(text) => println!("{avatar} {text}"),
            DisplayBlock::ToolCall {
                tool_name,
                arguments,
            } => println!("{avatar} call {tool_name}({arguments})"),
            DisplayBlock::ToolReturn { tool_name, content } => {
                println!("{avatar} {tool_name} -> {content}")
            }
            DisplayBlock::RetryPrompt { content, .. } => println!("{avatar} retry: {content}"),
            DisplayBlock::Thinking(text) => println!("{avatar} (thinking) {text}"),
            DisplayBlock::SystemPrompt(text) => println!("{avatar} (system) {text}"),
        }
    }
}

fn print_sidebar(chat: &ChatSession) {
    println!("== {} ==", chat.current_agent_name());
    if let Some(panel) = chat.sidebar() {
        println!("{panel}");
    }
}

/// Returns false when the user asked to quit.
fn handle_line(coordinator: &mut SessionCoordinator, ui_session: &str, line: &str) -> bool {
    let result = match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/clear", _) => coordinator.clear(ui_session),
        ("/agent", name) => coordinator.select_agent(ui_session, name.trim()),
        ("/context", toggle) => {
            coordinator.set_show_function_calls(ui_session, toggle.trim() == "on")
        }
        ("/share", _) => coordinator.share(ui_session).map(|record| {
            println!("shared as {} (viewed {} times)", record.key, record.access_count);
        }),
        ("/sidebar", _) => {
            if let Some(chat) = coordinator.session(ui_session) {
                print_sidebar(chat);
            }
            Ok(())
        }
        ("/history", _) => {
            if let Some(chat) = coordinator.session(ui_session) {
                for message in chat.visible_messages() {
                    print_message(chat, message.role(), message.blocks());
                }
            }
            Ok(())
        }
        _ => stream_reply(coordinator, ui_session, line),
    };

    if let Err(error) = result {
        eprintln!("! {}", error.notice());
    }
    true
}

fn stream_reply(
    coordinator: &mut SessionCoordinator,
    ui_session: &str,
    input: &str,
) -> Result<(), SessionError> {
    let show_status = coordinator
        .session(ui_session)
        .is_some_and(|chat| chat.preferences().show_function_calls_status);
    let Some(stream) = coordinator.submit(ui_session, input)? else {
        return Ok(());
    };

    let mut stdout = io::stdout();
    let mut outcome = Ok(());
    for event in stream {
        match event {
            Ok(RenderEvent::TextDelta(text)) => {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
            Ok(RenderEvent::StatusChange(label)) if show_status => eprintln!("[{label}]"),
            Ok(RenderEvent::ToolCallStarted(name)) => eprintln!("[tool call: {name}]"),
            Ok(RenderEvent::ToolResultReceived(name)) => eprintln!("[tool result: {name}]"),
            Ok(RenderEvent::StatusChange(_)) => {}
            Err(error) => outcome = Err(error),
        }
    }
    println!();
    outcome
}
