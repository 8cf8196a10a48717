//! Calendar Agent Example
//!
//! Runs the tool loop against a local OpenAI-compatible server with a small
//! in-memory calendar. Configure with the `AGENTLOOP_*` environment variables,
//! e.g. `AGENTLOOP_PROVIDER=ollama AGENTLOOP_MODEL=qwen2.5:7b`.
//!
//! ```bash
//! RUST_LOG=agentloop=debug cargo run --example calendar_agent -- "What's on Thursday?"
//! ```

use agentloop::{
    Agent, AgentOptions, JsonObjectExt, OrchestratorEvent, Provider, ToolDescriptor, Tools,
    describe_tools, tool,
};
use futures::StreamExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

type Calendar = Arc<Mutex<BTreeMap<String, Vec<String>>>>;

fn calendar_tools(calendar: Calendar) -> agentloop::Result<Tools> {
    let reader = calendar.clone();
    let writer = calendar;

    Tools::new()
        .with(
            tool("calendar_read", "List the events on a day (YYYY-MM-DD)")
                .param("date", "string")
                .build(move |args| {
                    let calendar = reader.clone();
                    async move {
                        let date = args.str_field("date")?.to_string();
                        let events = calendar
                            .lock()
                            .map_err(|_| agentloop::Error::other("calendar lock poisoned"))?
                            .get(&date)
                            .cloned()
                            .unwrap_or_default();
                        Ok(json!({"date": date, "events": events}))
                    }
                }),
        )?
        .with(
            tool("calendar_create", "Add an event to a day")
                .param("date", "string")
                .param("time", "string")
                .param("title", "string")
                .build(move |args| {
                    let calendar = writer.clone();
                    async move {
                        let date = args.str_field("date")?.to_string();
                        let entry = format!("{} {}", args.str_field("time")?, args.str_field("title")?);
                        calendar
                            .lock()
                            .map_err(|_| agentloop::Error::other("calendar lock poisoned"))?
                            .entry(date.clone())
                            .or_default()
                            .push(entry.clone());
                        Ok(json!({"created": entry, "date": date}))
                    }
                }),
        )
}

fn system_prompt(tools: &[ToolDescriptor], locale: &str) -> String {
    format!(
        "You are a calendar assistant. Answer in the language of locale {locale}.\n\
         To use a tool, reply with a fenced block:\n\
         ```json\n{{\"tool\": \"<name>\", \"arguments\": {{...}}}}\n```\n\
         Available tools:\n{}",
        describe_tools(tools)
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What's on my calendar on 2024-05-02?".to_string());

    let options = AgentOptions::builder()
        .provider(Provider::LMStudio)
        .model("qwen2.5-32b-instruct")
        .temperature(0.2)
        .apply_env(|key| std::env::var(key).ok())?
        .build()?;
    println!("Using {} at {}\n", options.model, options.base_url);

    let calendar: Calendar = Arc::new(Mutex::new(BTreeMap::from([(
        "2024-05-02".to_string(),
        vec!["09:00 standup".to_string(), "14:00 dentist".to_string()],
    )])));

    let tools = calendar_tools(calendar.clone())?;
    let agent = Agent::from_options(options, Arc::new(tools), Arc::new(system_prompt))?;

    println!("User: {}\n", question);
    let mut run = agent.submit(question).await;
    while let Some(event) = run.events().next().await {
        match event {
            OrchestratorEvent::Status(status) => println!("[{}]", status),
            OrchestratorEvent::ResponseChunk(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            OrchestratorEvent::ToolCall(name) => println!("\n-> calling {}", name),
            OrchestratorEvent::ToolArguments(args) => println!("   arguments: {}", args),
            OrchestratorEvent::ToolExecuting(_) => {}
            OrchestratorEvent::ToolResult(result) => println!("   result: {}", result),
            OrchestratorEvent::ResponseReplace(text) => println!("\n\nAssistant: {}", text),
            OrchestratorEvent::Error(e) => eprintln!("\nerror: {}", e),
        }
    }

    println!("\nOutcome: {:?}", run.wait().await);
    println!("Calendar now: {:?}", calendar.lock().map_err(|_| anyhow::anyhow!("poisoned"))?);
    Ok(())
}
