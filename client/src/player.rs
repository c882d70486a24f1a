//! Shared player record mutated by packet handlers and operator commands
//!
//! The record is touched from three contexts at once: the transport's receive
//! task (absolute position updates, join acknowledgment), the command
//! interpreter (relative moves) and the position broadcaster (reads). All
//! access goes through a single mutex and the accessors below; the lock is
//! never held across I/O.

use crate::error::MoveError;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl FromStr for Axis {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            other => Err(MoveError::InvalidAxis(other.to_string())),
        }
    }
}

/// Parses a move distance, rejecting anything that is not a finite number.
pub fn parse_distance(s: &str) -> Result<f64, MoveError> {
    match s.trim().parse::<f64>() {
        Ok(distance) if distance.is_finite() => Ok(distance),
        _ => Err(MoveError::InvalidNumber(s.trim().to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Default)]
struct Inner {
    position: Position,
    joined: bool,
}

#[derive(Debug)]
pub struct PlayerState {
    inner: Mutex<Inner>,
    joined_tx: watch::Sender<bool>,
}

impl PlayerState {
    /// Creates a player at the origin that has not joined yet.
    pub fn new() -> Self {
        let (joined_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner::default()),
            joined_tx,
        }
    }

    // Accessors never panic while holding the guard, so a poisoned lock
    // still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrites all three coordinates.
    pub fn set_absolute(&self, x: f64, y: f64, z: f64) {
        self.lock().position = Position { x, y, z };
    }

    /// Adds `distance` to the named axis and returns the new position.
    ///
    /// Both arguments are validated before the lock is taken, so a failed
    /// call leaves the state untouched.
    pub fn apply_delta(&self, axis: &str, distance: &str) -> Result<Position, MoveError> {
        let axis: Axis = axis.parse()?;
        let distance = parse_distance(distance)?;
        Ok(self.apply_parsed_delta(axis, distance))
    }

    pub fn apply_parsed_delta(&self, axis: Axis, distance: f64) -> Position {
        let mut inner = self.lock();
        match axis {
            Axis::X => inner.position.x += distance,
            Axis::Y => inner.position.y += distance,
            Axis::Z => inner.position.z += distance,
        }
        inner.position
    }

    /// Marks the join acknowledgment as received. Idempotent.
    pub fn mark_joined(&self) {
        self.lock().joined = true;
        self.joined_tx.send_replace(true);
    }

    pub fn is_joined(&self) -> bool {
        self.lock().joined
    }

    pub fn snapshot(&self) -> Position {
        self.lock().position
    }

    /// Resolves once [`mark_joined`](Self::mark_joined) has been called.
    pub async fn wait_joined(&self) {
        let mut joined_rx = self.joined_tx.subscribe();
        while !*joined_rx.borrow_and_update() {
            // The sender lives in `self`, so this only fails if `self` is gone.
            if joined_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_player_starts_at_origin() {
        let player = PlayerState::new();
        assert_eq!(player.snapshot(), Position::default());
        assert!(!player.is_joined());
    }

    #[test]
    fn test_set_absolute_last_write_wins() {
        let player = PlayerState::new();
        player.set_absolute(1.0, 2.0, 3.0);
        player.set_absolute(4.0, 5.0, 6.0);
        player.set_absolute(4.0, 5.0, 6.0);

        assert_eq!(player.snapshot(), Position { x: 4.0, y: 5.0, z: 6.0 });
    }

    #[test]
    fn test_apply_delta_on_y() {
        let player = PlayerState::new();
        let position = player.apply_delta("y", "5").unwrap();

        assert_eq!(position, Position { x: 0.0, y: 5.0, z: 0.0 });
        assert_eq!(player.snapshot(), position);
    }

    #[test]
    fn test_apply_delta_invalid_axis() {
        let player = PlayerState::new();
        let result = player.apply_delta("w", "5");

        assert_eq!(result, Err(MoveError::InvalidAxis("w".to_string())));
        assert_eq!(player.snapshot(), Position::default());
    }

    #[test]
    fn test_apply_delta_invalid_number() {
        let player = PlayerState::new();
        let result = player.apply_delta("x", "abc");

        assert_eq!(result, Err(MoveError::InvalidNumber("abc".to_string())));
        assert_eq!(player.snapshot(), Position::default());
    }

    #[test]
    fn test_apply_delta_rejects_non_finite() {
        let player = PlayerState::new();
        assert!(player.apply_delta("x", "inf").is_err());
        assert!(player.apply_delta("x", "NaN").is_err());
        assert_eq!(player.snapshot(), Position::default());
    }

    #[test]
    fn test_apply_delta_negative_fraction() {
        let player = PlayerState::new();
        player.set_absolute(1.0, 2.0, 3.0);
        let position = player.apply_delta("z", "-2.5").unwrap();

        assert_approx_eq!(position.x, 1.0);
        assert_approx_eq!(position.y, 2.0);
        assert_approx_eq!(position.z, 0.5);
    }

    #[test]
    fn test_mark_joined_twice() {
        let player = PlayerState::new();
        player.mark_joined();
        player.mark_joined();
        assert!(player.is_joined());
    }

    #[test]
    fn test_concurrent_deltas_are_not_lost() {
        let player = Arc::new(PlayerState::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let player = Arc::clone(&player);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        player.apply_parsed_delta(Axis::X, 1.0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_approx_eq!(player.snapshot().x, 1000.0);
    }

    #[tokio::test]
    async fn test_wait_joined_resolves_after_mark() {
        let player = Arc::new(PlayerState::new());
        let waiter = {
            let player = Arc::clone(&player);
            tokio::spawn(async move { player.wait_joined().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        player.mark_joined();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_joined_when_already_joined() {
        let player = PlayerState::new();
        player.mark_joined();
        tokio::time::timeout(Duration::from_millis(100), player.wait_joined())
            .await
            .unwrap();
    }
}
