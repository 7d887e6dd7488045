//! Online play through the synchronization client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chess::pgn::parse_san;
use chess::{MoveRequest, Position};
use chess_client::{
    ClientEvent, Color, ColorPreference, ConnectionState, CreateGame, FileTokenStore, JoinOptions,
    Membership, ReconnectPolicy, RemoteGameState, SyncClient, TcpConnector, TimeControl,
};
use chess_common::format_square;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::render;

const HELP: &str = "\
Commands:
  e2e4, e7e8q, Nf3    play a move (coordinates or SAN)
  state               show the game
  leave               give up your seat and stop following the game
  quit";

#[derive(Debug, Clone)]
pub enum OnlineMode {
    Create {
        color: ColorPreference,
        minutes: Option<u64>,
        increment_secs: u64,
        fen: Option<String>,
    },
    Join {
        game_id: String,
        color: Option<ColorPreference>,
    },
}

#[derive(Debug, Clone)]
pub struct OnlineOptions {
    pub addr: String,
    pub name: Option<String>,
    pub mode: OnlineMode,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OnlineCommand {
    Move {
        from: String,
        to: String,
        promotion: Option<String>,
    },
    State,
    Leave,
    Help,
    Quit,
    Unknown(String),
}

/// Interpret one input line. Moves are resolved against the mirrored
/// position so SAN works too.
fn parse_command(line: &str, mirror: Option<&RemoteGameState>) -> Option<OnlineCommand> {
    let line = line.trim();
    let command = match line {
        "" => return None,
        "state" | "board" => OnlineCommand::State,
        "leave" => OnlineCommand::Leave,
        "help" | "?" => OnlineCommand::Help,
        "quit" | "exit" => OnlineCommand::Quit,
        text => match resolve_move(text, mirror) {
            Some(request) => OnlineCommand::Move {
                from: format_square(request.from),
                to: format_square(request.to),
                promotion: request.promotion.map(|p| p.to_char_lower().to_string()),
            },
            None => OnlineCommand::Unknown(text.to_string()),
        },
    };
    Some(command)
}

fn resolve_move(text: &str, mirror: Option<&RemoteGameState>) -> Option<MoveRequest> {
    if let Ok(request) = text.parse::<MoveRequest>() {
        return Some(request);
    }
    let position = Position::from_fen(&mirror?.fen).ok()?;
    parse_san(&position, text).ok()
}

fn create_request(name: Option<String>, mode: &OnlineMode) -> Option<CreateGame> {
    let OnlineMode::Create {
        color,
        minutes,
        increment_secs,
        fen,
    } = mode
    else {
        return None;
    };
    Some(CreateGame {
        creator_name: name,
        creator_color: Some(*color),
        time_control: minutes.map(|m| TimeControl {
            initial_ms: m.saturating_mul(60_000),
            increment_ms: increment_secs.saturating_mul(1000),
        }),
        initial_position: fen.clone(),
    })
}

/// Prints mirrored states, skipping exact repeats (an ack and a push often
/// carry the same snapshot).
struct Display {
    perspective: Color,
    last_shown: Option<RemoteGameState>,
}

impl Display {
    fn show(&mut self, state: &RemoteGameState) {
        if self.last_shown.as_ref() == Some(state) {
            return;
        }
        println!("{}", render::remote_game(state, self.perspective));
        self.last_shown = Some(state.clone());
    }

    fn reset(&mut self) {
        self.last_shown = None;
    }
}

pub async fn run(options: OnlineOptions) -> anyhow::Result<()> {
    let store = Arc::new(FileTokenStore::in_dir(&options.data_dir));
    let client = SyncClient::spawn(
        Box::new(TcpConnector::new(options.addr.clone())),
        store,
        ReconnectPolicy::default(),
    );

    println!("Connecting to {}...", options.addr);
    client
        .connect()
        .await
        .with_context(|| format!("Could not reach server at {}", options.addr))?;
    let (_, mut events) = client.subscribe().await?;

    let joined = match &options.mode {
        OnlineMode::Join { game_id, color } => client
            .join_game(
                game_id,
                JoinOptions {
                    name: options.name.clone(),
                    color: *color,
                },
            )
            .await
            .with_context(|| format!("Could not join game {}", game_id))?,
        create => {
            let request = create_request(options.name.clone(), create).unwrap_or_default();
            client
                .create_game(request)
                .await
                .context("Could not create game")?
        }
    };

    println!("Game id: {}", joined.game_id);
    match joined.participant.color {
        Some(color) => println!("You play {:?}.", color),
        None => println!("You are watching."),
    }
    println!("Type 'help' for commands.");

    let mut display = Display {
        perspective: joined.participant.color.unwrap_or(Color::White),
        last_shown: None,
    };
    display.show(&joined.state);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let mirror = client.state().await?.mirror().cloned();
                match parse_command(&line, mirror.as_ref()) {
                    None => {}
                    Some(OnlineCommand::Quit) => break,
                    Some(OnlineCommand::Help) => println!("{}", HELP),
                    Some(OnlineCommand::State) => match mirror {
                        Some(state) => {
                            display.reset();
                            display.show(&state);
                        }
                        None => println!("Not following a game."),
                    },
                    Some(OnlineCommand::Leave) => match client.leave_game().await {
                        Ok(()) => println!("Left the game."),
                        Err(e) => println!("Leave failed: {}", e),
                    },
                    Some(OnlineCommand::Move { from, to, promotion }) => {
                        if let Err(e) = client.send_move(&from, &to, promotion.as_deref()).await {
                            println!("Move not accepted: {}", e);
                        }
                    }
                    Some(OnlineCommand::Unknown(text)) => {
                        println!("Unknown command or move: {}", text);
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => show_event(&mut display, event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Display lagging behind client events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

fn show_event(display: &mut Display, event: ClientEvent) {
    match event {
        ClientEvent::State(state) => display.show(&state),
        ClientEvent::Connection(ConnectionState::Connecting) => {
            println!("Connection lost, reconnecting...");
        }
        ClientEvent::Connection(ConnectionState::Connected) => println!("Connected."),
        ClientEvent::Connection(ConnectionState::Error(reason)) => {
            println!("Connection failed: {}", reason);
        }
        ClientEvent::Connection(ConnectionState::Idle) => {}
        ClientEvent::Membership(Membership::NotInGame) => println!("No longer in a game."),
        ClientEvent::Membership(Membership::InGame { participant, .. }) => {
            if let Some(color) = participant.color {
                display.perspective = color;
            }
        }
        ClientEvent::DisplayReset => {
            println!("The server gave you a new identity in this game.");
            display.reset();
        }
        ClientEvent::ServerError(message) => println!("Server: {}", message),
    }
}
