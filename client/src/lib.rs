//! # Headless Game Client Library
//!
//! Session core for a terminal client of a tick-based multiplayer protocol.
//! After logging in and joining a world, three activities share one
//! connection and one player record:
//!
//! - the **position broadcaster** sends the player's position every tick
//!   (50 ms), compensating for the time spent building and sending;
//! - the **transport's receive task** decodes inbound packets and hands them
//!   to the packet dispatcher, whose listeners update the player record;
//! - the **command interpreter** reads operator lines and turns them into
//!   chat, respawn requests or local moves.
//!
//! ## Module Organization
//!
//! ### Dispatcher (`dispatcher`)
//! Listener registry keyed by packet kind, with a wildcard list, inbound and
//! outbound directions, and early/normal priority tiers.
//!
//! ### Player (`player`)
//! Mutex-guarded position and join flag. Only atomic accessors are exposed.
//!
//! ### Broadcast (`broadcast`)
//! The fixed-cadence position loop. It does not send anything until the join
//! acknowledgment has arrived.
//!
//! ### Input (`input`)
//! Line-based command interpreter (`/respawn`, `/move`, everything else is chat).
//!
//! ### Session (`session`)
//! Startup ordering and the top-level run loop:
//! `Connecting -> Authenticated | Offline -> Connected -> AwaitingJoin -> Running -> Terminated`.
//!
//! ### Connection and Auth (`connection`, `auth`)
//! The UDP transport and the identity service client the session depends on.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::{ServerAddress, SessionConfig};
//! use client::session::{Login, Session};
//! use tokio::io::BufReader;
//!
//! # async fn example() -> Result<(), client::error::SessionError> {
//! let address: ServerAddress = "localhost:25565".parse()?;
//! let mut session = Session::new(SessionConfig::default());
//!
//! let credentials = session
//!     .login(Login::Offline { username: "steve".to_string() })
//!     .await?;
//! session.open(&address, credentials).await?;
//!
//! session
//!     .run(
//!         BufReader::new(tokio::io::stdin()),
//!         tokio::io::stdout(),
//!         tokio::signal::ctrl_c(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod input;
pub mod player;
pub mod session;
