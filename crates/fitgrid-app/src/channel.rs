//! Snapshot delivery to a consumer on another thread.

use crossfire::mpmc;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, detect_backoff_cfg};
use fitgrid_core::{FitnessSnapshot, SnapshotSink};
use tracing::warn;

pub type SnapshotSender = MAsyncTx<FitnessSnapshot>;
pub type SnapshotReceiver = MRx<FitnessSnapshot>;

pub fn create_snapshot_bus(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_tx_async_rx_blocking(capacity)
}

/// Forwards published snapshots to a consumer on another thread.
///
/// Never blocks the observing thread: when the queue is full the snapshot
/// is dropped; the consumer catches up with the next one.
pub struct ChannelSink {
    sender: SnapshotSender,
    dropped: u64,
    disconnected: bool,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: SnapshotSender) -> Self {
        Self {
            sender,
            dropped: 0,
            disconnected: false,
        }
    }
}

impl SnapshotSink for ChannelSink {
    fn on_snapshot(&mut self, snapshot: &FitnessSnapshot) {
        if self.disconnected {
            return;
        }
        match self.sender.try_send(*snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(snapshot)) => {
                self.dropped += 1;
                warn!(sequence = snapshot.sequence, dropped = self.dropped, "snapshot queue full; dropping snapshot");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.disconnected = true;
                warn!("snapshot queue disconnected");
            }
        }
    }
}

/// Hand every queued snapshot to `consume`; returns how many were drained.
pub fn drain_snapshots(
    receiver: &SnapshotReceiver,
    mut consume: impl FnMut(FitnessSnapshot),
) -> usize {
    let mut drained = 0;
    loop {
        match receiver.try_recv() {
            Ok(snapshot) => {
                consume(snapshot);
                drained += 1;
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(sequence: u64) -> FitnessSnapshot {
        FitnessSnapshot {
            sequence,
            ..FitnessSnapshot::default()
        }
    }

    #[test]
    fn forwards_in_order_and_drops_when_full() {
        let (tx, rx) = create_snapshot_bus(2);
        let mut sink = ChannelSink::new(tx);
        for sequence in 1..=3 {
            sink.on_snapshot(&snapshot(sequence));
        }
        let mut seen = Vec::new();
        assert_eq!(drain_snapshots(&rx, |s| seen.push(s.sequence)), 2);
        assert_eq!(seen, vec![1, 2]);

        sink.on_snapshot(&snapshot(4));
        assert_eq!(drain_snapshots(&rx, |s| seen.push(s.sequence)), 1);
        assert_eq!(seen, vec![1, 2, 4]);
    }
}
