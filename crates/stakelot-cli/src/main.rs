//! Stakelot CLI
//!
//! Runs scenarios against the simulator and exposes the fee schedule and
//! winner allocation as standalone calculators.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use primitive_types::U256;
use stakelot_economics::FeeSchedule;
use stakelot_lottery::winning_ticket_count;
use stakelot_sim::config::LoggingConfig;
use stakelot_sim::{resolve_account, Scenario, ScenarioReport, SimConfig, Simulator};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stakelot")]
#[command(author = "Stakelot Developers")]
#[command(version)]
#[command(about = "Stakelot - staking rewards and no-loss lottery simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a TOML scenario
    Run {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Configuration file; `STAKELOT__*` variables override it
        #[arg(short, long, env = "STAKELOT_CONFIG")]
        config: Option<PathBuf>,

        /// Write the final state here
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Start from a previously written snapshot instead of genesis
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unstake fee after holding for a while
    Fee {
        /// Seconds since the weighted-average stake time
        #[arg(short, long)]
        elapsed_secs: u64,

        /// Amount to compute the fee on
        #[arg(short, long)]
        amount: Option<u128>,

        /// Configuration file with a custom fee schedule
        #[arg(short, long, env = "STAKELOT_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Winning tickets per player for a given seed
    Winners {
        /// Random number, hex
        #[arg(short, long)]
        seed: String,

        /// Total tickets sold
        #[arg(short, long)]
        total: u64,

        /// Winning tickets allowed at the reached tier
        #[arg(short, long)]
        max_win: u64,

        /// `name:tickets` or `0xaddress:tickets`, repeatable
        #[arg(short, long = "player", required = true)]
        players: Vec<String>,
    },

    /// Show version information
    Version,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = logging.format == "json";
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SimConfig> {
    let path = path.map(expand_path);
    SimConfig::load(path.as_deref()).context("loading configuration")
}

fn parse_player(spec: &str) -> anyhow::Result<(String, u64)> {
    let (name, tickets) = spec
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected name:tickets, got {spec:?}"))?;
    let tickets = tickets
        .parse()
        .with_context(|| format!("invalid ticket count in {spec:?}"))?;
    Ok((name.to_string(), tickets))
}

fn total_held(players: &[(String, u64)]) -> anyhow::Result<u64> {
    players
        .iter()
        .try_fold(0u64, |acc, (_, tickets)| acc.checked_add(*tickets))
        .ok_or_else(|| anyhow!("ticket counts overflow"))
}

fn parse_seed(seed: &str) -> anyhow::Result<U256> {
    let digits = seed.strip_prefix("0x").unwrap_or(seed);
    U256::from_str_radix(digits, 16).map_err(|e| anyhow!("invalid seed {seed:?}: {e}"))
}

fn print_report(report: &ScenarioReport) {
    println!("Scenario: {}", report.name);
    for step in &report.steps {
        for receipt in &step.receipts {
            let status = if receipt.outcome.is_success() { "ok" } else { "failed" };
            let flag = if step.matched { "" } else { "  <- unexpected" };
            println!(
                "  #{:<4} step {:<3} {:<22} {:<8}{}",
                receipt.sequence,
                step.index,
                receipt.tx.name(),
                status,
                flag
            );
        }
    }

    let s = &report.summary;
    println!();
    println!("Transactions: {} ({} ok, {} failed)", s.transactions, s.succeeded, s.failed);
    println!("Clock: t={} block={}", s.timestamp, s.block_number);
    println!("Staked: {}  reward pool: {}  fee pool: {}", s.total_staked, s.reward_pool, s.fee_pool);
    println!("Lottery: {} with {} tickets", s.lottery_state, s.tickets_sold);
    for (account, balances) in &s.balances {
        let held: Vec<String> = balances.iter().map(|(t, b)| format!("{t}={b}")).collect();
        println!("  {account}: {}", held.join(" "));
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            config,
            snapshot,
            resume,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.verbose, &config.logging);

            let scenario = Scenario::from_path(&expand_path(&scenario))
                .context("reading scenario")?;
            let mut sim = match resume {
                Some(path) => Simulator::load_snapshot(&expand_path(&path))?,
                None => Simulator::new(&config)?,
            };
            let report = scenario.run(&mut sim, resolve_account(&config.chain.admin))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if let Some(path) = snapshot {
                sim.save_snapshot(&expand_path(&path))?;
            }

            let mismatches = report.mismatches();
            if mismatches > 0 {
                bail!("{mismatches} step(s) did not match their expected outcome");
            }
        }

        Commands::Fee {
            elapsed_secs,
            amount,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(cli.verbose, &config.logging);

            let schedule: &FeeSchedule = &config.staking.fees;
            let bps = schedule.fee_bps(elapsed_secs);
            println!("Elapsed: {elapsed_secs}s");
            println!("Fee: {bps} bps ({:.2}%)", bps as f64 / 100.0);
            if let Some(amount) = amount {
                let fee = FeeSchedule::fee_for(amount, bps);
                println!("On {amount}: fee {fee}, returned {}", amount - fee);
            }
        }

        Commands::Winners {
            seed,
            total,
            max_win,
            players,
        } => {
            init_logging(cli.verbose, &LoggingConfig::default());

            let random = parse_seed(&seed)?;
            let players = players
                .iter()
                .map(|spec| parse_player(spec))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let held = total_held(&players)?;
            if held > total {
                bail!("players hold {held} tickets but only {total} were sold");
            }

            println!("Seed: {random:#x}");
            println!("Tickets sold: {total}, winning allowed: {max_win}");
            let mut awarded = 0;
            for (name, tickets) in &players {
                let address = resolve_account(name);
                let won = winning_ticket_count(random, &address, *tickets, total, max_win)?;
                awarded += won;
                println!("  {name:<20} {address}  tickets {tickets:>6}  winning {won:>6}");
            }
            println!("Winning tickets awarded: {awarded}");
        }

        Commands::Version => {
            println!("Stakelot v{}", env!("CARGO_PKG_VERSION"));
            println!("Rust: {}", rustc_version_runtime::version());
            println!();
            println!("Features:");
            println!("  - Reward-per-token staking (per-second or per-block)");
            println!("  - Time-decayed unstake fees");
            println!("  - No-loss lottery with tiered awards");
            println!("  - Two-phase random number oracle");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player() {
        assert_eq!(parse_player("alice:12").unwrap(), ("alice".to_string(), 12));
        assert_eq!(
            parse_player("0x00000000000000000000000000000000000000aa:3").unwrap().1,
            3
        );
        assert!(parse_player("alice").is_err());
        assert!(parse_player("alice:many").is_err());
    }

    #[test]
    fn test_total_held() {
        let players = vec![("alice".to_string(), 3), ("bob".to_string(), 4)];
        assert_eq!(total_held(&players).unwrap(), 7);

        let players = vec![("alice".to_string(), u64::MAX), ("bob".to_string(), 1)];
        assert!(total_held(&players).is_err());
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("0xff").unwrap(), U256::from(255));
        assert_eq!(parse_seed("10").unwrap(), U256::from(16));
        assert!(parse_seed("0xzz").is_err());
    }

    #[test]
    fn test_cli_parses_winners() {
        let cli = Cli::try_parse_from([
            "stakelot", "winners", "--seed", "0x1", "--total", "10", "--max-win", "2",
            "--player", "a:5", "--player", "b:5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Winners { ref players, .. } if players.len() == 2));
    }
}
