#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::sync::Arc;

use anyhow::Context;
use args::{Args, AskArgs, Command};
use clap::Parser;
use council_config::{Config, LlmProviderType};
use council_llm::{LlmState, build_provider, probe, test_connection};
use council_meeting::{Collaborators, MeetingError, MeetingEvent, MeetingRequest, Orchestrator, Panel, Position};
use council_memory::{LlmSummarizer, MemoryManager, MemoryStore, Summarizer};
use council_tools::{McpManager, StaticMarketData, StockSnapshot, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    council_telemetry::init(&config.telemetry, "info")?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    match args.command {
        Command::Ask(ask) => run_meeting(config, ask).await,
        Command::Probe => run_probe(&config).await,
        Command::Check { provider } => run_check(&config, &provider).await,
        Command::Forget { topic } => {
            let llm = LlmState::from_providers(None, Default::default());
            let (orchestrator, _events) = build_orchestrator(&config, llm, None);
            orchestrator.forget(&topic).await?;
            println!("forgot {topic}");
            Ok(())
        }
        Command::Agents => {
            let panel = Panel::from_config(&config.meeting);
            for agent in panel.all() {
                let binding = agent
                    .provider
                    .as_deref()
                    .or(config.llm.default_provider.as_deref())
                    .unwrap_or("-");
                let state = if agent.enabled { "" } else { " (disabled)" };
                println!("{}\t{}\t{}\t{binding}{state}", agent.id, agent.name, agent.role);
            }
            Ok(())
        }
    }
}

fn build_orchestrator(
    config: &Config,
    llm: LlmState,
    stock: Option<&StockSnapshot>,
) -> (Orchestrator, tokio::sync::mpsc::Receiver<MeetingEvent>) {
    let summarizer = llm
        .resolve(config.memory.provider.as_deref())
        .map(|provider| Arc::new(LlmSummarizer::new(provider)) as Arc<dyn Summarizer>);
    if summarizer.is_none() && config.memory.enabled {
        tracing::warn!("no binding for memory summarization, rounds will be kept verbatim");
    }
    let memory = MemoryManager::new(
        config.memory.clone(),
        MemoryStore::new(config.storage.memory_dir()),
        summarizer,
    );

    let market = StaticMarketData {
        quotes: stock.cloned().into_iter().collect(),
        indices: Vec::new(),
    };

    Orchestrator::new(
        config.meeting.clone(),
        Collaborators {
            llm,
            tools: ToolRegistry::with_market_data(Arc::new(market)),
            mcp: McpManager::new(&config.mcp),
            memory: Arc::new(memory),
            transcripts: council_meeting::TranscriptStore::new(config.storage.transcripts_dir()),
        },
    )
}

fn snapshot(ask: &AskArgs) -> anyhow::Result<StockSnapshot> {
    if let Some(path) = &ask.stock_file {
        let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&raw).with_context(|| format!("invalid stock snapshot in {}", path.display()));
    }

    Ok(StockSnapshot {
        symbol: ask.symbol.clone().unwrap_or_else(|| ask.topic.clone()),
        name: ask.name.clone().unwrap_or_default(),
        price: ask.price.unwrap_or_default(),
        change_percent: ask.change.unwrap_or_default(),
        ..StockSnapshot::default()
    })
}

async fn run_meeting(config: Config, ask: AskArgs) -> anyhow::Result<()> {
    let stock = snapshot(&ask)?;
    let llm = LlmState::from_config(&config.llm).await?;
    let (orchestrator, mut events) = build_orchestrator(&config, llm, Some(&stock));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        }
    });

    let request = MeetingRequest {
        topic: ask.topic,
        stock,
        position: ask.shares.map(|shares| Position {
            shares,
            cost_price: ask.cost.unwrap_or_default(),
        }),
        query: ask.query,
        mentions: ask.mentions,
        reply_to: ask.reply_to,
        reply_content: ask.reply_content,
    };

    let (result, interrupted) = {
        let meeting = orchestrator.ask(request);
        tokio::pin!(meeting);
        tokio::select! {
            result = &mut meeting => (result, false),
            () = shutdown_signal() => {
                orchestrator.shutdown();
                (meeting.await, true)
            }
        }
    };
    // closes the event channel so the printer drains and exits
    drop(orchestrator);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(MeetingError::Cancelled) if interrupted => {
            tracing::info!("meeting interrupted");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(memory) = outcome.memory
        && let Err(e) = memory.await
    {
        tracing::warn!(error = %e, "memory update task failed");
    }
    printer.await.context("event printer failed")?;

    tracing::info!(messages = outcome.messages.len(), "meeting complete");
    Ok(())
}

async fn run_probe(config: &Config) -> anyhow::Result<()> {
    for (name, binding) in &config.llm.providers {
        if binding.provider_type != LlmProviderType::Openai {
            continue;
        }
        let verdict = match binding.no_system_role {
            Some(flag) => format!("{} (configured)", role_label(flag)),
            None => role_label(probe::needs_system_downgrade(name, binding).await).to_owned(),
        };
        println!("{name}\t{}\t{verdict}", binding.model);
    }
    Ok(())
}

const fn role_label(no_system_role: bool) -> &'static str {
    if no_system_role { "system folded into user turn" } else { "system role supported" }
}

async fn run_check(config: &Config, name: &str) -> anyhow::Result<()> {
    let binding = config
        .llm
        .providers
        .get(name)
        .with_context(|| format!("unknown provider binding '{name}'"))?;
    let provider = build_provider(name, binding, binding.no_system_role.unwrap_or(false));

    test_connection(provider.as_ref())
        .await
        .with_context(|| format!("connection test for '{name}' failed"))?;
    println!("{name}: ok ({})", provider.model());
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
