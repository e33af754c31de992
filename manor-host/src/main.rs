//! `manor`: play the manor from a terminal.
//!
//! Reads one player line at a time from stdin, runs the player turn,
//! narrates it, then lets every NPC act. The story goes to stdout; logs go
//! to stderr.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use manor_core::config::GeneralConfig;
use manor_core::{IntentInterpreter, SchedulerDeps, ToolRegistry, TurnReport, TurnScheduler};
use manor_host::{Narrator, config};
use manor_llm::CompletionBackend;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "manor", version)]
#[command(about = "A text adventure where NPCs take their own turns")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON world snapshot seeding the in-memory store
    #[arg(short, long)]
    world: Option<PathBuf>,

    /// No completion provider, in-memory store
    #[arg(long)]
    offline: bool,
}

fn init_tracing(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if general.log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_events(report: &TurnReport) {
    for line in &report.events {
        println!("  · {line}");
    }
}

/// One player line, its narration, and the NPC cycle that follows.
async fn play_round(
    scheduler: &mut TurnScheduler,
    narrator: &Narrator,
    input: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let report = scheduler.player_turn(input, cancel).await?;
    print_events(&report);

    let history = scheduler.history();
    let narration = narrator.narrate(scheduler.world(), &history, &report, cancel).await;
    println!("\n{narration}\n");

    let facts = scheduler.record_narration(&narration, cancel).await;
    debug!(extracted = facts.extracted, recorded = facts.recorded, "narration facts");
    scheduler.narration_completed()?;

    for npc in scheduler.run_npc_cycle(cancel).await? {
        if !npc.is_idle() {
            print_events(&npc);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.offline {
        config::apply_offline(&mut settings);
    }
    init_tracing(&settings.general);
    info!(offline = cli.offline, "starting manor");

    let startup = CancellationToken::new();
    let llm: Arc<dyn CompletionBackend> =
        Arc::new(config::llm_client(&settings.llm).context("building completion client")?);
    let prompts = Arc::new(config::prompt_engine(&settings.llm).context("loading prompt templates")?);
    let store = config::world_store(&settings.store, cli.world.as_deref(), &startup)
        .await
        .context("connecting to the world store")?;

    let planner = IntentInterpreter::new(Arc::clone(&llm), Arc::clone(&store), Arc::clone(&prompts));
    let deps = SchedulerDeps {
        store,
        llm: Arc::clone(&llm),
        planner: Arc::new(planner),
        registry: Arc::new(ToolRegistry::standard()),
        prompts: Arc::clone(&prompts),
    };
    let mut scheduler = TurnScheduler::connect(deps, settings.turns.clone(), &startup)
        .await
        .context("fetching the initial world state")?;
    let narrator = Narrator::new(llm, prompts);

    if let Some(here) = scheduler.world().location(&scheduler.world().player_location) {
        println!("You are in the {}. Type 'quit' to leave.\n", here.name);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        // Ctrl-C during a round abandons its in-flight calls, not the game.
        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });
        let outcome = play_round(&mut scheduler, &narrator, input, &cancel).await;
        interrupt.abort();
        outcome?;
        if cancel.is_cancelled() {
            println!("(interrupted)");
        }
    }

    info!("goodbye");
    Ok(())
}
