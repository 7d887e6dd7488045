//! ChessTTY command-line front end.
//!
//! `chesstty play` runs a local game against a friend or the built-in
//! computer. `chesstty online` creates or joins a game on a multiplayer
//! server and keeps it in sync through `chess-client`.

mod config;
mod local;
mod online;
mod render;
mod session_file;

use std::path::Path;

use anyhow::Context;
use chess::PieceColor;
use chess_client::ColorPreference;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chesstty", about = "Terminal chess, local or over the network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play on this terminal, optionally against the computer.
    Play {
        /// Start from this position instead of the standard one.
        #[arg(long)]
        fen: Option<String>,

        /// Side the computer plays.
        #[arg(long, value_enum)]
        computer: Option<Side>,

        /// Search depth for the computer and hints.
        #[arg(long)]
        depth: Option<u32>,

        /// Minutes per side; untimed when omitted.
        #[arg(long)]
        minutes: Option<u64>,
    },

    /// Play on a multiplayer server.
    Online {
        /// Server address, `host:port`.
        #[arg(long)]
        addr: Option<String>,

        /// Name shown to the other players.
        #[arg(long)]
        name: Option<String>,

        /// Join an existing game instead of creating one.
        #[arg(long, conflicts_with_all = ["minutes", "increment", "fen"])]
        join: Option<String>,

        /// Seat to ask for.
        #[arg(long, value_enum)]
        color: Option<SeatChoice>,

        /// Minutes per side for a new game; untimed when omitted.
        #[arg(long)]
        minutes: Option<u64>,

        /// Seconds added after each move in a new timed game.
        #[arg(long, default_value_t = 0)]
        increment: u64,

        /// Starting position for a new game.
        #[arg(long)]
        fen: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for PieceColor {
    fn from(side: Side) -> Self {
        match side {
            Side::White => PieceColor::White,
            Side::Black => PieceColor::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeatChoice {
    White,
    Black,
    Random,
}

impl From<SeatChoice> for ColorPreference {
    fn from(choice: SeatChoice) -> Self {
        match choice {
            SeatChoice::White => ColorPreference::White,
            SeatChoice::Black => ColorPreference::Black,
            SeatChoice::Random => ColorPreference::Random,
        }
    }
}

fn init_logging(log_path: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .context("Log path has no file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Could not create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(&config::get_log_path())?;
    let data_dir = config::get_data_dir();

    tracing::info!("ChessTTY starting up");

    match cli.command {
        Commands::Play {
            fen,
            computer,
            depth,
            minutes,
        } => {
            local::run(local::LocalOptions {
                fen,
                computer: computer.map(PieceColor::from),
                depth: depth.unwrap_or_else(config::get_advisor_depth),
                minutes,
                data_dir,
            })
            .await?;
        }
        Commands::Online {
            addr,
            name,
            join,
            color,
            minutes,
            increment,
            fen,
        } => {
            let mode = match join {
                Some(game_id) => online::OnlineMode::Join {
                    game_id,
                    color: color.map(ColorPreference::from),
                },
                None => online::OnlineMode::Create {
                    color: color.map(ColorPreference::from).unwrap_or_default(),
                    minutes,
                    increment_secs: increment,
                    fen,
                },
            };
            online::run(online::OnlineOptions {
                addr: addr.unwrap_or_else(config::get_server_addr),
                name,
                mode,
                data_dir,
            })
            .await?;
        }
    }

    tracing::info!("ChessTTY shutting down");
    Ok(())
}
