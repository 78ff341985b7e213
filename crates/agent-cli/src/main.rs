mod logging;
mod render;
mod settings;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::{AgentEvent, Conversation, ToolRegistry};
use agent_loop::{Agent, AgentLoopConfig};
use agent_structured::{FieldSpec, FieldType, ObjectSchema, ResultSchema};
use agent_tools::{weather_tools, DependencyContext};

use crate::render::WhaleTable;
use crate::settings::Settings;

const WEATHER_MODEL: &str = "gpt-4o-mini";
const STRUCTURED_MODEL: &str = "gpt-4o";
const WEATHER_SYSTEM_PROMPT: &str = "あなたは親切な日本語のアシスタントです。";

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Tool-using and structured-output agent runs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a weather question using the OpenWeather tools
    Weather {
        #[arg(default_value = "神戸の明日の天気を知りたい")]
        query: String,
    },
    /// Stream a list of whale species into a live table
    Whales {
        #[arg(long, default_value_t = 15)]
        count: usize,
    },
    /// Ask for a city and its country as a structured result
    City {
        #[arg(default_value = "The windy city in the US of A.")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.settings.debug);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling the run");
            trigger.cancel();
        }
    });

    let settings = cli.settings;
    match cli.command {
        Commands::Weather { query } => run_weather(&settings, &query, &cancel).await,
        Commands::Whales { count } => run_whales(&settings, count, &cancel).await,
        Commands::City { prompt } => run_city(&settings, &prompt, &cancel).await,
    }
}

async fn run_weather(settings: &Settings, query: &str, cancel: &CancellationToken) -> Result<()> {
    let config = with_event_printer(
        settings.loop_config().with_system_prompt(WEATHER_SYSTEM_PROMPT),
        settings.debug,
    );
    let agent = Agent::new(
        settings.provider(WEATHER_MODEL)?,
        Arc::new(weather_tools()?),
        config,
    );

    println!("{}", format!("🚀 {query}").cyan());

    // Lives for this run only; dropped on every exit path.
    let deps = DependencyContext::with_client(
        settings.openweather_api_key.clone(),
        reqwest::Client::new(),
    );
    if deps.credential().is_none() {
        log::warn!("OPENWEATHER_API_KEY is not set; lookups will be rejected");
    }

    let outcome = agent.run(query, &deps, cancel).await?;

    println!("{}", outcome.output);
    print_conversation(&outcome.conversation, settings.debug)
}

async fn run_whales(settings: &Settings, count: usize, cancel: &CancellationToken) -> Result<()> {
    let schema = ResultSchema::List(
        ObjectSchema::new()
            .field(FieldSpec::required("name", FieldType::String))
            .field(
                FieldSpec::required("length", FieldType::Number)
                    .describe("Average length of an adult whale in meters."),
            )
            .field(
                FieldSpec::optional("weight", FieldType::Number)
                    .describe("Average weight of an adult whale in kilograms.")
                    .ge(50.0),
            )
            .field(FieldSpec::optional("ocean", FieldType::String))
            .field(FieldSpec::optional("description", FieldType::String).describe("Short Description")),
    );
    let agent: Agent<()> = Agent::new(
        settings.provider(STRUCTURED_MODEL)?,
        Arc::new(ToolRegistry::new()),
        with_event_printer(settings.loop_config(), settings.debug),
    );

    println!("{}", "Requesting data...".cyan());
    let mut table = WhaleTable::stdout();
    let outcome = agent
        .run_stream_structured(
            format!("Generate me details of {count} species of Whale."),
            &schema,
            &(),
            &mut table,
            cancel,
        )
        .await?;

    let received = outcome.output.as_array().map(Vec::len).unwrap_or_default();
    println!("{}", format!("✨ {received} species received").green());
    log::info!("Token usage: {}", outcome.usage);
    print_conversation(&outcome.conversation, settings.debug)
}

async fn run_city(settings: &Settings, prompt: &str, cancel: &CancellationToken) -> Result<()> {
    let schema = ResultSchema::Object(
        ObjectSchema::new()
            .field(FieldSpec::required("city", FieldType::String))
            .field(FieldSpec::required("country", FieldType::String)),
    );
    let model = settings.model.as_deref().unwrap_or(STRUCTURED_MODEL);
    println!("{}", format!("Using model: {model}").dimmed());

    let agent: Agent<()> = Agent::new(
        settings.provider(STRUCTURED_MODEL)?,
        Arc::new(ToolRegistry::new()),
        with_event_printer(settings.loop_config(), settings.debug),
    );
    let outcome = agent.run_structured(prompt, &schema, &(), cancel).await?;

    println!("{}", outcome.output);
    println!("{}", format!("Usage: {}", outcome.usage).dimmed());
    print_conversation(&outcome.conversation, settings.debug)
}

fn print_conversation(conversation: &Conversation, debug: bool) -> Result<()> {
    if debug {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(conversation.messages())?.dimmed()
        );
    }
    Ok(())
}

/// In debug mode, prints tool activity to stderr as it happens.
fn with_event_printer(config: AgentLoopConfig, debug: bool) -> AgentLoopConfig {
    if !debug {
        return config;
    }

    let (event_tx, mut event_rx) = mpsc::channel::<AgentEvent>(256);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AgentEvent::ToolStart {
                    tool_name,
                    arguments,
                    ..
                } => {
                    eprintln!("{}", format!("🔧 Executing tool: {tool_name}").yellow());
                    eprintln!("{}", format!("   Args: {arguments}").dimmed());
                }
                AgentEvent::ToolComplete { tool_name, .. } => {
                    eprintln!("{}", format!("✅ Tool finished: {tool_name}").green());
                }
                AgentEvent::ToolRetry {
                    tool_name, reason, ..
                } => {
                    eprintln!("{}", format!("↻ {tool_name} asked for a retry: {reason}").yellow());
                }
                AgentEvent::ToolError { error, .. } => {
                    eprintln!("{}", format!("❌ Tool error: {error}").red());
                }
                AgentEvent::Complete { rounds } => {
                    eprintln!("{}", format!("📊 Completed in {rounds} round(s)").dimmed());
                }
                AgentEvent::Error { message } => {
                    eprintln!("{}", format!("❌ Error: {message}").red());
                }
                AgentEvent::StructuredUpdate { .. } => {}
            }
        }
    });

    config.with_event_sender(event_tx)
}
