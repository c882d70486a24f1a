//! Fixed-cadence position updates

use crate::connection::PacketSink;
use crate::error::ConnectionError;
use crate::player::PlayerState;
use log::{debug, error, warn};
use shared::Packet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Sends the player's position once per tick for the rest of the session.
///
/// Consumed by [`spawn`](Self::spawn), so a broadcaster can only ever run once.
pub struct PositionBroadcaster<S> {
    player: Arc<PlayerState>,
    sink: S,
    interval: Duration,
}

impl<S: PacketSink + 'static> PositionBroadcaster<S> {
    pub fn new(player: Arc<PlayerState>, sink: S, interval: Duration) -> Self {
        Self {
            player,
            sink,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!("Position broadcast stopped: {}", e);
            }
        })
    }

    /// Waits for the join acknowledgment, then loops until a send fails.
    pub async fn run(self) -> Result<(), ConnectionError> {
        self.player.wait_joined().await;
        debug!("Broadcasting position every {:?}", self.interval);

        loop {
            let started = Instant::now();

            let position = self.player.snapshot();
            self.sink.write_packet(Packet::PlayerPosition {
                x: position.x,
                feet_y: position.y,
                z: position.z,
                on_ground: true,
            })?;

            let elapsed = started.elapsed();
            if elapsed > self.interval {
                warn!("Position update took {:?}, longer than one tick", elapsed);
            }
            sleep(self.interval.saturating_sub(elapsed)).await;
        }
    }
}
