//! Match Simulator CLI Tool
//!
//! Drives the matching engine and expiration sweeper against an in-memory
//! store on a simulated clock, without starting the service.
//!
//! Usage:
//!   cargo run --bin match-sim -- --help
//!   cargo run --bin match-sim simulate --rounds 20 --arrivals 7 --min 2 --max 4
//!   cargo run --bin match-sim scenario --name relaxation

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use matchmaker::config::{CleanupSettings, MatchmakingSettings};
use matchmaker::matching::MatchingEngine;
use matchmaker::store::InMemoryTicketStore;
use matchmaker::sweeper::ExpirationSweeper;
use matchmaker::ticket::{CreateTicketRequest, TicketService};
use matchmaker::types::{MatchParameter, ParameterOperator, PlayerParameter, TicketStatus};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "match-sim")]
#[command(about = "Simulate matchmaking passes against an in-memory ticket queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Minimum players per session
    #[arg(long, default_value = "2", global = true)]
    min: usize,

    /// Maximum players per session
    #[arg(long, default_value = "2", global = true)]
    max: usize,

    /// Seconds a ticket waits before relaxation or expiry
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed arrivals into the queue and run a pass every step
    Simulate {
        /// Number of simulated passes
        #[arg(short, long, default_value = "10")]
        rounds: usize,
        /// Tickets filed before each pass
        #[arg(short, long, default_value = "5")]
        arrivals: usize,
        /// Distinct league values arrivals spread over
        #[arg(short, long, default_value = "3")]
        leagues: usize,
        /// Simulated seconds between passes
        #[arg(short, long, default_value = "10")]
        step: u64,
        /// Seconds expired tickets are kept before deletion
        #[arg(short, long, default_value = "60")]
        grace: u64,
    },
    /// Run a predefined scenario
    Scenario {
        /// Scenario name (equal, greater, smaller, relaxation, timeout)
        #[arg(short, long)]
        name: String,
    },
}

struct Simulation {
    store: Arc<InMemoryTicketStore>,
    tickets: TicketService,
    engine: MatchingEngine,
    sweeper: ExpirationSweeper,
    settings: MatchmakingSettings,
    start: DateTime<Utc>,
}

impl Simulation {
    fn new(settings: MatchmakingSettings) -> Result<Self> {
        let store = Arc::new(InMemoryTicketStore::new());
        Ok(Self {
            tickets: TicketService::new(store.clone()),
            engine: MatchingEngine::new(store.clone())?,
            sweeper: ExpirationSweeper::new(store.clone())?,
            store,
            settings,
            start: Utc::now(),
        })
    }

    fn at(&self, seconds: u64) -> DateTime<Utc> {
        self.start + ChronoDuration::seconds(seconds as i64)
    }

    async fn file(&self, request: CreateTicketRequest, seconds: u64) -> Result<()> {
        let player_id = request.player_id.clone();
        self.tickets.create_ticket_at(request, self.at(seconds)).await?;
        println!("  🎟️  t={:>4}s filed ticket for {}", seconds, player_id);
        Ok(())
    }

    async fn pass(&self, seconds: u64) -> Result<usize> {
        let sessions = self.engine.run_pass(self.at(seconds), &self.settings).await?;
        for session in &sessions {
            println!(
                "  🎮 t={:>4}s session {} with {:?}",
                seconds, session.id, session.player_ids
            );
        }
        Ok(sessions.len())
    }

    async fn status(&self, player_id: &str) -> Result<TicketStatus> {
        Ok(self.tickets.get_ticket(player_id).await?.status)
    }

    async fn print_summary(&self) -> Result<()> {
        let engine = self.engine.get_stats().await?;
        let sweeper = self.sweeper.get_stats().await?;

        println!("\n📊 Summary");
        println!("  Passes: {}", engine.passes_completed);
        println!(
            "  Sessions: {} ({} relaxed)",
            engine.sessions_created, engine.relaxed_sessions
        );
        println!("  Players matched: {}", engine.players_matched);
        println!("  Tickets expired: {}", engine.tickets_expired);
        println!("  Tickets removed: {}", sweeper.tickets_removed);
        println!("  Tickets still stored: {}", self.store.ticket_count()?);
        Ok(())
    }
}

fn league_request(player_id: &str, league: f64) -> CreateTicketRequest {
    CreateTicketRequest::new(
        player_id,
        vec![MatchParameter::new("league", ParameterOperator::Equal, league)],
        vec![PlayerParameter::new("league", league)],
    )
}

fn pair_request(player_id: &str, operator: ParameterOperator, league: f64, table: f64) -> CreateTicketRequest {
    CreateTicketRequest::new(
        player_id,
        vec![
            MatchParameter::new("league", operator, league),
            MatchParameter::new("table", operator, table),
        ],
        vec![
            PlayerParameter::new("league", league),
            PlayerParameter::new("table", table),
        ],
    )
}

async fn simulate(
    settings: MatchmakingSettings,
    rounds: usize,
    arrivals: usize,
    leagues: usize,
    step: u64,
    grace: u64,
) -> Result<()> {
    let cleanup = CleanupSettings {
        expired_ticket_grace_period_seconds: grace,
        ..CleanupSettings::default()
    };
    cleanup.validate()?;

    let sim = Simulation::new(settings)?;
    let leagues = leagues.max(1);
    let mut filed = 0usize;

    println!(
        "🧪 Simulating {} rounds of {} arrivals over {} leagues",
        rounds, arrivals, leagues
    );

    for round in 0..rounds {
        let now = round as u64 * step;
        for _ in 0..arrivals {
            // Spread arrivals unevenly so some leagues run short
            let league = ((filed * 7 + filed / 3) % leagues) as f64;
            sim.file(league_request(&format!("player_{}", filed), league), now)
                .await?;
            filed += 1;
        }

        let formed = sim.pass(now).await?;
        let removed = sim
            .sweeper
            .run_pass(sim.at(now), cleanup.grace_period(), cleanup.scan_batch_size)
            .await?;
        println!(
            "⏱️  round {:>3}: {} sessions, {} expired tickets removed",
            round + 1,
            formed,
            removed
        );
    }

    sim.print_summary().await
}

async fn run_scenario(name: &str, settings: MatchmakingSettings) -> Result<bool> {
    match name {
        "equal" => {
            let sim = Simulation::new(MatchmakingSettings::new(2, 2, settings.match_timeout()))?;
            for (player, league, table) in [
                ("player_a", 1.0, 2.0),
                ("player_b", 7.0, 8.0),
                ("player_c", 7.0, 8.0),
                ("player_d", 7.0, 9.0),
                ("player_e", 3.0, 8.0),
            ] {
                sim.file(pair_request(player, ParameterOperator::Equal, league, table), 0)
                    .await?;
            }
            let formed = sim.pass(0).await?;
            Ok(formed == 1
                && sim.status("player_b").await? == TicketStatus::Found
                && sim.status("player_c").await? == TicketStatus::Found)
        }
        "greater" => {
            let sim = Simulation::new(MatchmakingSettings::new(2, 4, settings.match_timeout()))?;
            sim.file(pair_request("seeker", ParameterOperator::GreaterThan, 5.0, 6.0), 0)
                .await?;
            for (i, score) in [10.0, 11.0, 12.0].into_iter().enumerate() {
                sim.file(
                    pair_request(&format!("high_{}", i), ParameterOperator::Equal, score, score),
                    0,
                )
                .await?;
            }
            Ok(sim.pass(0).await? == 1)
        }
        "smaller" => {
            let sim = Simulation::new(MatchmakingSettings::new(2, 3, settings.match_timeout()))?;
            sim.file(pair_request("seeker", ParameterOperator::SmallerThan, 10.0, 11.0), 0)
                .await?;
            for (i, score) in [5.0, 6.0].into_iter().enumerate() {
                sim.file(
                    pair_request(&format!("low_{}", i), ParameterOperator::Equal, score, score),
                    0,
                )
                .await?;
            }
            Ok(sim.pass(0).await? == 1)
        }
        "relaxation" => {
            let sim = Simulation::new(MatchmakingSettings::new(2, 3, Duration::from_secs(3)))?;
            sim.file(league_request("early", 7.0), 0).await?;
            sim.file(league_request("fresh", 7.0), 10).await?;
            Ok(sim.pass(10).await? == 1)
        }
        "timeout" => {
            let sim = Simulation::new(MatchmakingSettings::new(2, 2, Duration::from_secs(3)))?;
            sim.file(league_request("loner", 7.0), 0).await?;
            let immediate = sim.pass(0).await?;
            let later = sim.pass(4).await?;
            println!("  ⌛ loner is now {}", sim.status("loner").await?);
            Ok(immediate == 0 && later == 0 && sim.status("loner").await? == TicketStatus::Expired)
        }
        _ => Err(anyhow::anyhow!(
            "Unknown scenario '{}'. Available: equal, greater, smaller, relaxation, timeout",
            name
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = MatchmakingSettings::new(cli.min, cli.max, Duration::from_secs(cli.timeout));
    settings.validate()?;

    match cli.command {
        Commands::Simulate {
            rounds,
            arrivals,
            leagues,
            step,
            grace,
        } => simulate(settings, rounds, arrivals, leagues, step, grace).await?,

        Commands::Scenario { name } => {
            println!("🧪 Running scenario: {}", name);
            match run_scenario(&name.to_lowercase(), settings).await {
                Ok(true) => println!("✅ Scenario completed successfully!"),
                Ok(false) => {
                    println!("❌ Scenario did not produce the expected outcome.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Error running scenario: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
