//! Packet listener registry with wildcard and priority tiers
//!
//! Listeners are keyed by [`PacketKind`] plus a separate wildcard list that is
//! consulted for every packet. Within one direction, early listeners run before
//! normal ones, and each tier runs in registration order regardless of whether
//! a listener was registered for a concrete kind or for any packet.

use crate::error::ListenerError;
use log::error;
use shared::{Direction, Packet, PacketKind};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

pub type Callback = Arc<dyn Fn(&Packet) -> Result<(), ListenerError> + Send + Sync>;

/// Which packets a listener wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketFilter {
    Any,
    Kind(PacketKind),
}

impl From<PacketKind> for PacketFilter {
    fn from(kind: PacketKind) -> Self {
        PacketFilter::Kind(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Early,
    Normal,
}

struct Entry {
    seq: u64,
    callback: Callback,
}

#[derive(Default)]
struct Tier {
    by_kind: HashMap<PacketKind, Vec<Entry>>,
    any: Vec<Entry>,
}

impl Tier {
    /// Appends matching callbacks to `out`, merging the kind-specific and
    /// wildcard lists back into registration order.
    fn collect(&self, kind: PacketKind, out: &mut Vec<Callback>) {
        let specific = self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        let (mut i, mut j) = (0, 0);

        while i < specific.len() || j < self.any.len() {
            let take_specific = match (specific.get(i), self.any.get(j)) {
                (Some(a), Some(b)) => a.seq < b.seq,
                (Some(_), None) => true,
                _ => false,
            };

            if take_specific {
                out.push(Arc::clone(&specific[i].callback));
                i += 1;
            } else {
                out.push(Arc::clone(&self.any[j].callback));
                j += 1;
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    next_seq: u64,
    tiers: HashMap<(Direction, Priority), Tier>,
}

/// Registry shared between the session (registration, outbound dispatch) and
/// the transport's receive task (inbound dispatch).
#[derive(Default)]
pub struct PacketDispatcher {
    registry: RwLock<Registry>,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &self,
        filter: impl Into<PacketFilter>,
        direction: Direction,
        priority: Priority,
        callback: F,
    ) where
        F: Fn(&Packet) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let seq = registry.next_seq;
        registry.next_seq += 1;

        let entry = Entry {
            seq,
            callback: Arc::new(callback),
        };
        let tier = registry.tiers.entry((direction, priority)).or_default();
        match filter.into() {
            PacketFilter::Any => tier.any.push(entry),
            PacketFilter::Kind(kind) => tier.by_kind.entry(kind).or_default().push(entry),
        }
    }

    /// Invokes every matching listener and returns how many ran.
    ///
    /// A listener that returns an error or panics is logged and skipped; the
    /// remaining listeners still run and nothing is reported to the caller.
    pub fn dispatch(&self, packet: &Packet, direction: Direction) -> usize {
        let callbacks = self.matching(packet.kind(), direction);

        for callback in &callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(packet))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Listener for {:?} failed: {}", packet.kind(), e),
                Err(_) => error!("Listener for {:?} panicked", packet.kind()),
            }
        }

        callbacks.len()
    }

    // Callbacks are cloned out so the lock is released before any of them
    // run; a listener may itself send a packet and re-enter dispatch.
    fn matching(&self, kind: PacketKind, direction: Direction) -> Vec<Callback> {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut callbacks = Vec::new();
        for priority in [Priority::Early, Priority::Normal] {
            if let Some(tier) = registry.tiers.get(&(direction, priority)) {
                tier.collect(kind, &mut callbacks);
            }
        }
        callbacks
    }
}
