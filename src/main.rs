// Price-chart loader and announcement gate for the Oasis trading UI.
// HTTP client module.
mod http {
    // HTTP client implementation.
    pub mod client;
}
// vulcan0x GraphQL data service.
mod vulcan0x {
    // Query service trait and client.
    pub mod api_caller;
    // GraphQL document building.
    pub mod query;
    // Response envelopes.
    pub mod response;
}
// Data models.
mod model;
// Aggregated-trades loader.
mod loader;
// Announcement gate.
mod announcement;
// Data storage module.
mod store {
    /// Key-value local storage.
    pub mod local_storage;
    /// SQLite database interaction.
    pub mod sqlite;
}
// Environment configuration.
mod config;
// module storing defaults
mod constants;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::sync::mpsc;

use announcement::{Announcement, AnnouncementView, Rendered, flags::LocalStorageFlags};
use config::AppConfig;
use model::{GroupMode, TradingPair, Visibility};

// Command-line argument parser.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

// Subcommands for the application.
#[derive(Subcommand, Debug)]
enum Commands {
    // Stream aggregated trades for a market.
    Chart {
        #[arg(long, default_value = "WETH/DAI")]
        pair: TradingPair,
        #[arg(long, value_enum, default_value = "by-day")]
        group_mode: GroupMode,
        // Number of group units to look back.
        #[arg(long, default_value_t = 30)]
        interval: u32,
        // Seconds between re-queries, standing in for new blocks.
        #[arg(long, default_value_t = 15)]
        refresh_secs: u64,
        // Stop after this many chart updates.
        #[arg(long, default_value_t = 1)]
        updates: usize,
    },
    // Render an announcement gate, optionally dismissing it.
    Announcement {
        #[arg(long)]
        id: String,
        #[arg(long, value_enum, default_value = "once")]
        visibility: Visibility,
        #[arg(long, default_value = "New contract")]
        headline: String,
        #[arg(long, default_value = "Trading moved to a new market contract.")]
        content: String,
        #[arg(long, default_value = "Continue")]
        button_label: String,
        // Click continue after the first render.
        #[arg(long)]
        proceed: bool,
    },
}

#[tokio::main]
// Main function entry point.
async fn main() {
    dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Chart {
            pair,
            group_mode,
            interval,
            refresh_secs,
            updates,
        } => {
            let config = match AppConfig::from_env() {
                Ok(config) => config,
                Err(err) => {
                    log::error!("Error loading configuration: {}", err);
                    return;
                }
            };
            match chart(config, pair, group_mode, interval, refresh_secs, updates).await {
                Ok(n) => log::info!("Received {} chart updates", n),
                Err(err) => log::error!("Error loading chart: {}", err),
            }
        }

        Commands::Announcement {
            id,
            visibility,
            headline,
            content,
            button_label,
            proceed,
        } => {
            let view = AnnouncementView {
                headline,
                content,
                button_label,
            };
            if let Err(err) = announce(&id, visibility, view, proceed) {
                log::error!("Error rendering announcement {}: {}", id, err);
            }
        }
    }
}

async fn chart(
    config: AppConfig,
    pair: TradingPair,
    group_mode: GroupMode,
    interval: u32,
    refresh_secs: u64,
    updates: usize,
) -> Result<usize, loader::LoaderError> {
    let clock = config.clock;
    let (config_tx, config_rx) = mpsc::channel(1);
    let (tick_tx, tick_rx) = mpsc::channel(1);

    // Latest configuration stays on the channel for the loader to pick up.
    if let Err(err) = config_tx.send(config.network).await {
        log::error!("Error publishing network config: {}", err);
        return Ok(0);
    }

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(refresh_secs.max(1)));
        let mut block = 0u64;
        loop {
            timer.tick().await;
            block += 1;
            if tick_tx.send(block).await.is_err() {
                break;
            }
        }
    });

    let mut rx = loader::load_aggregated_trades(
        Arc::new(vulcan0x::api_caller::Vulcan0x),
        interval,
        group_mode.unit(),
        clock,
        config_rx,
        tick_rx,
        pair.clone(),
    );

    let mut received = 0;
    while received < updates {
        let Some(update) = rx.recv().await else {
            break;
        };
        let points = update?;
        received += 1;

        println!("{} ({} bars)", pair, points.len());
        for p in points {
            let label = match p.timestamp {
                Some(ts) => group_mode.label(&clock.at(&ts)),
                None => "invalid date".into(),
            };
            println!(
                "{:>12}  o {:<12} h {:<12} l {:<12} c {:<12} vol {}",
                label, p.open, p.high, p.low, p.close, p.turnover
            );
        }
    }
    // Keeps the config stream open until we are done reading.
    drop(config_tx);
    Ok(received)
}

fn announce(
    id: &str,
    visibility: Visibility,
    view: AnnouncementView,
    proceed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let conn = store::sqlite::init_connection(&AppConfig::sqlite_file_from_env())?;
    let mut flags = LocalStorageFlags::new(conn)?;

    let mut gate = Announcement::new(id, visibility, view, "(next view)");
    print_rendered(gate.render(&flags)?);

    if proceed {
        gate.proceed(&mut flags)?;
        print_rendered(gate.render(&flags)?);
    }
    Ok(())
}

fn print_rendered(rendered: Rendered<'_, &str>) {
    match rendered {
        Rendered::Announcement(view) => println!("{}\n", view),
        Rendered::NextView(next) => println!("{}\n", next),
    }
}
