//! Session controller: login, connect, wait for join, then run
//!
//! ```text
//! Connecting -> Authenticated | Offline -> Connected -> AwaitingJoin -> Running -> Terminated
//! ```
//!
//! The session owns the single [`PlayerState`] and [`PacketDispatcher`] and
//! hands them to the transport, the broadcaster and the interpreter.

use crate::auth::authenticate;
use crate::broadcast::PositionBroadcaster;
use crate::config::{ServerAddress, SessionConfig};
use crate::connection::{Connection, Credentials};
use crate::dispatcher::{PacketDispatcher, PacketFilter, Priority};
use crate::error::{ConnectionError, SessionError};
use crate::input::CommandInterpreter;
use crate::player::PlayerState;
use log::{debug, info};
use shared::{Direction, Packet, PacketKind};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Offline,
    Connected,
    AwaitingJoin,
    Running,
    Terminated,
}

/// How to obtain credentials.
#[derive(Debug, Clone)]
pub enum Login {
    Offline {
        username: String,
    },
    Online {
        username: String,
        password: String,
        auth_server: String,
    },
}

/// Wires the player record and operator echo into the dispatcher.
pub fn register_handlers(
    dispatcher: &PacketDispatcher,
    player: &Arc<PlayerState>,
    dump_packets: bool,
) {
    if dump_packets {
        dispatcher.register(
            PacketFilter::Any,
            Direction::Inbound,
            Priority::Early,
            |packet: &Packet| {
                eprintln!("--> {:?}", packet);
                Ok(())
            },
        );
        dispatcher.register(
            PacketFilter::Any,
            Direction::Outbound,
            Priority::Normal,
            |packet: &Packet| {
                eprintln!("<-- {:?}", packet);
                Ok(())
            },
        );
    }

    {
        let player = Arc::clone(player);
        dispatcher.register(
            PacketKind::PlayerPositionAndLook,
            Direction::Inbound,
            Priority::Normal,
            move |packet: &Packet| {
                if let Packet::PlayerPositionAndLook { x, y, z, .. } = packet {
                    player.set_absolute(*x, *y, *z);
                    println!("Position set to {}", player.snapshot());
                }
                Ok(())
            },
        );
    }

    {
        let player = Arc::clone(player);
        dispatcher.register(
            PacketKind::JoinGame,
            Direction::Inbound,
            Priority::Normal,
            move |_: &Packet| {
                println!("Connected.");
                player.mark_joined();
                Ok(())
            },
        );
    }

    dispatcher.register(
        PacketKind::ChatMessage,
        Direction::Inbound,
        Priority::Normal,
        |packet: &Packet| {
            if let Packet::ChatMessage { json_data, position } = packet {
                println!("Message ({}): {}", position, json_data);
            }
            Ok(())
        },
    );

    dispatcher.register(
        PacketKind::Disconnect,
        Direction::Inbound,
        Priority::Normal,
        |packet: &Packet| {
            if let Packet::Disconnect { reason } = packet {
                println!("Disconnected: {}", reason);
            }
            Ok(())
        },
    );
}

pub struct Session {
    config: SessionConfig,
    state: SessionState,
    player: Arc<PlayerState>,
    dispatcher: Arc<PacketDispatcher>,
    connection: Option<Connection>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Connecting,
            player: Arc::new(PlayerState::new()),
            dispatcher: Arc::new(PacketDispatcher::new()),
            connection: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player(&self) -> &Arc<PlayerState> {
        &self.player
    }

    pub fn dispatcher(&self) -> &Arc<PacketDispatcher> {
        &self.dispatcher
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Resolves credentials. Authentication failure terminates the session.
    pub async fn login(&mut self, login: Login) -> Result<Credentials, SessionError> {
        match login {
            Login::Offline { username } => {
                println!("Connecting in offline mode...");
                self.transition(SessionState::Offline);
                Ok(Credentials::Offline { username })
            }
            Login::Online {
                username,
                password,
                auth_server,
            } => match authenticate(&auth_server, &username, &password).await {
                Ok(token) => {
                    println!("Logged in as {}...", token.username);
                    self.transition(SessionState::Authenticated);
                    Ok(Credentials::Online(token))
                }
                Err(e) => {
                    self.transition(SessionState::Terminated);
                    Err(e.into())
                }
            },
        }
    }

    /// Registers the packet handlers, then opens the transport.
    pub async fn open(
        &mut self,
        address: &ServerAddress,
        credentials: Credentials,
    ) -> Result<(), SessionError> {
        register_handlers(&self.dispatcher, &self.player, self.config.dump_packets);

        let mut connection = Connection::new(
            address.host.clone(),
            address.port,
            credentials,
            Arc::clone(&self.dispatcher),
        );
        if let Err(e) = connection.connect().await {
            self.transition(SessionState::Terminated);
            return Err(e.into());
        }

        self.connection = Some(connection);
        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Waits for the join acknowledgment, then runs the broadcaster and the
    /// interpreter until the operator interrupts or something fatal happens.
    ///
    /// An interrupt ends the session with `Ok(())`.
    pub async fn run<R, W, I>(
        &mut self,
        input: R,
        output: W,
        interrupt: I,
    ) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        I: Future,
    {
        let result = self.run_connected(input, output, interrupt).await;
        self.transition(SessionState::Terminated);
        result
    }

    async fn run_connected<R, W, I>(
        &mut self,
        input: R,
        output: W,
        interrupt: I,
    ) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        I: Future,
    {
        let connection = self.connection.take().ok_or(ConnectionError::NotConnected)?;
        let sender = connection.sender()?;
        tokio::pin!(interrupt);

        self.transition(SessionState::AwaitingJoin);
        let joined = wait_for_join(&self.player, &self.config);
        tokio::select! {
            result = joined => result?,
            reason = connection.closed() => return Err(SessionError::Disconnected(reason)),
            _ = &mut interrupt => {
                println!("Bye!");
                return Ok(());
            }
        }

        self.transition(SessionState::Running);
        info!("Joined the game");
        let broadcast = PositionBroadcaster::new(
            Arc::clone(&self.player),
            sender.clone(),
            self.config.tick_interval,
        )
        .spawn();

        let mut interpreter =
            CommandInterpreter::new(input, output, sender, Arc::clone(&self.player));
        let result = tokio::select! {
            result = interpreter.run() => result,
            reason = connection.closed() => Err(SessionError::Disconnected(reason)),
            _ = &mut interrupt => {
                println!("Bye!");
                Ok(())
            }
        };

        broadcast.abort();
        result
    }
}

async fn wait_for_join(player: &PlayerState, config: &SessionConfig) -> Result<(), SessionError> {
    match config.join_timeout {
        Some(limit) => tokio::time::timeout(limit, player.wait_joined())
            .await
            .map_err(|_| SessionError::JoinTimeout(limit)),
        None => {
            player.wait_joined().await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::player::Position;
    use std::time::Duration;

    fn position_and_look(x: f64, y: f64, z: f64) -> Packet {
        Packet::PlayerPositionAndLook {
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: 1,
        }
    }

    #[test]
    fn test_position_handler_sets_absolute() {
        let dispatcher = PacketDispatcher::new();
        let player = Arc::new(PlayerState::new());
        register_handlers(&dispatcher, &player, false);

        dispatcher.dispatch(&position_and_look(10.0, 70.0, -4.0), Direction::Inbound);
        assert_eq!(player.snapshot(), Position { x: 10.0, y: 70.0, z: -4.0 });
    }

    #[test]
    fn test_join_handler_marks_joined() {
        let dispatcher = PacketDispatcher::new();
        let player = Arc::new(PlayerState::new());
        register_handlers(&dispatcher, &player, false);

        let join = Packet::JoinGame {
            entity_id: 1,
            game_mode: 0,
            dimension: 0,
        };
        dispatcher.dispatch(&join, Direction::Inbound);
        dispatcher.dispatch(&join, Direction::Inbound);
        assert!(player.is_joined());
    }

    #[test]
    fn test_outbound_position_does_not_touch_player() {
        let dispatcher = PacketDispatcher::new();
        let player = Arc::new(PlayerState::new());
        register_handlers(&dispatcher, &player, true);

        let ran = dispatcher.dispatch(
            &Packet::PlayerPosition {
                x: 5.0,
                feet_y: 5.0,
                z: 5.0,
                on_ground: true,
            },
            Direction::Outbound,
        );
        assert_eq!(ran, 1);
        assert_eq!(player.snapshot(), Position::default());
    }

    #[test]
    fn test_dump_printers_are_optional() {
        let player = Arc::new(PlayerState::new());
        let chat = Packet::Chat {
            message: "hi".to_string(),
        };

        let quiet = PacketDispatcher::new();
        register_handlers(&quiet, &player, false);
        assert_eq!(quiet.dispatch(&chat, Direction::Outbound), 0);

        let verbose = PacketDispatcher::new();
        register_handlers(&verbose, &player, true);
        assert_eq!(verbose.dispatch(&chat, Direction::Outbound), 1);
    }

    #[tokio::test]
    async fn test_offline_login() {
        let mut session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Connecting);

        let credentials = session
            .login(Login::Offline {
                username: "alex".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(credentials.username(), "alex");
        assert_eq!(session.state(), SessionState::Offline);
    }

    /// Serves one HTTP response carrying `body` on a local port.
    async fn identity_service(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            // Read the whole request so closing the socket does not reset it.
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        url
    }

    fn online(auth_server: String) -> Login {
        Login::Online {
            username: "steve".to_string(),
            password: "wrong".to_string(),
            auth_server,
        }
    }

    #[tokio::test]
    async fn test_unreachable_identity_service_is_fatal() {
        let mut session = Session::new(SessionConfig::default());
        let result = session.login(online("http://127.0.0.1:1".to_string())).await;

        assert!(matches!(result, Err(SessionError::Auth(_))));
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.connection.is_none());
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_reported_verbatim() {
        let auth_server = identity_service(
            "403 Forbidden",
            r#"{"error":"ForbiddenOperationException","errorMessage":"Invalid credentials."}"#,
        )
        .await;

        let mut session = Session::new(SessionConfig::default());
        let err = session.login(online(auth_server)).await.unwrap_err();

        assert!(matches!(err, SessionError::Auth(AuthError::Service { .. })));
        assert_eq!(err.to_string(), "ForbiddenOperationException: Invalid credentials.");
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.connection.is_none());
    }

    #[tokio::test]
    async fn test_run_without_connection() {
        let mut session = Session::new(SessionConfig::default());
        let result = session
            .run(&b""[..], tokio::io::sink(), std::future::pending::<()>())
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Connection(ConnectionError::NotConnected))
        ));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_join_timeout() {
        let player = PlayerState::new();
        let config = SessionConfig {
            join_timeout: Some(Duration::from_millis(20)),
            ..SessionConfig::default()
        };

        let result = wait_for_join(&player, &config).await;
        assert!(matches!(result, Err(SessionError::JoinTimeout(_))));

        player.mark_joined();
        assert!(wait_for_join(&player, &config).await.is_ok());
    }
}
