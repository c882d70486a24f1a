//! Operator command interpreter reading one line at a time

use crate::connection::PacketSink;
use crate::error::{MoveError, SessionError};
use crate::player::{parse_distance, Axis, PlayerState};
use log::debug;
use shared::{ClientStatusAction, Packet};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

pub const RESPAWN_DIRECTIVE: &str = "/respawn";
pub const MOVE_DIRECTIVE: &str = "/move";
pub const AXIS_PROMPT: &str = "which way do you want to move?(x)(y)(z): ";
pub const DISTANCE_PROMPT: &str = "How many blocks do you want to move?: ";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Respawn,
    Move { axis: Axis, distance: f64 },
    Chat { text: String },
}

/// What a raw line asks for before any follow-up prompts.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Respawn,
    Move,
    Chat(String),
}

/// Only exact directive matches count; anything else is chat.
pub fn classify(line: &str) -> Directive {
    match line {
        RESPAWN_DIRECTIVE => Directive::Respawn,
        MOVE_DIRECTIVE => Directive::Move,
        _ => Directive::Chat(line.to_string()),
    }
}

pub struct CommandInterpreter<R, W, S> {
    lines: Lines<R>,
    output: W,
    sink: S,
    player: Arc<PlayerState>,
}

impl<R, W, S> CommandInterpreter<R, W, S>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: PacketSink,
{
    pub fn new(input: R, output: W, sink: S, player: Arc<PlayerState>) -> Self {
        Self {
            lines: input.lines(),
            output,
            sink,
            player,
        }
    }

    /// Runs until the input stream ends or a send fails.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        loop {
            let command = self.next_command().await?;
            self.execute(command).await?;
        }
    }

    /// Reads lines until one yields a command. Bad move input is reported to
    /// the operator and the interpreter goes back to waiting for a line.
    pub async fn next_command(&mut self) -> Result<Command, SessionError> {
        loop {
            let line = self.read_line().await?;

            match classify(&line) {
                Directive::Respawn => return Ok(Command::Respawn),
                Directive::Chat(text) => return Ok(Command::Chat { text }),
                Directive::Move => match self.read_move().await? {
                    Ok(command) => return Ok(command),
                    Err(e) => self.say(&e.to_string()).await?,
                },
            }
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<(), SessionError> {
        debug!("Executing {:?}", command);

        match command {
            Command::Respawn => {
                self.say("respawning...").await?;
                self.sink.write_packet(Packet::ClientStatus {
                    action: ClientStatusAction::Respawn,
                })?;
            }
            Command::Move { axis, distance } => {
                let position = self.player.apply_parsed_delta(axis, distance);
                self.say(&format!("Moved to {}", position)).await?;
            }
            Command::Chat { text } => {
                self.sink.write_packet(Packet::Chat { message: text })?;
            }
        }
        Ok(())
    }

    // Both prompts are always asked so the operator sees one consistent flow;
    // the axis is validated first.
    async fn read_move(&mut self) -> Result<Result<Command, MoveError>, SessionError> {
        self.prompt(AXIS_PROMPT).await?;
        let axis = self.read_line().await?;
        self.prompt(DISTANCE_PROMPT).await?;
        let distance = self.read_line().await?;

        let parsed = axis.parse::<Axis>().and_then(|axis| {
            parse_distance(&distance).map(|distance| Command::Move { axis, distance })
        });
        Ok(parsed)
    }

    async fn read_line(&mut self) -> Result<String, SessionError> {
        self.lines
            .next_line()
            .await?
            .ok_or(SessionError::InputClosed)
    }

    async fn prompt(&mut self, text: &str) -> Result<(), SessionError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> Result<(), SessionError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}
