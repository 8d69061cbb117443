// crates/scene-hub-server/src/stream.rs
// ============================================================================
// Module: Live-Stream Hub
// Description: Broadcast fan-out of committed frames to extension clients.
// Purpose: Carry full_sync and mutation frames plus test dispatch traffic.
// Dependencies: scene-hub-core, scene-hub-testlab, tokio, serde_json
// ============================================================================

//! ## Overview
//! The hub owns one broadcast channel of serialized text frames. The command
//! path publishes through [`scene_hub_core::interfaces::LiveUpdateSink`]
//! after each commit; the test manager publishes dispatch and abort orders
//! through [`scene_hub_testlab::EditorBridge`]. WebSocket connections
//! subscribe and forward frames verbatim, so ordering is the channel's send
//! order, which matches commit order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use scene_hub_core::interfaces::LiveFrame;
use scene_hub_core::interfaces::LiveUpdateSink;
use scene_hub_testlab::DispatchOrder;
use scene_hub_testlab::EditorBridge;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Frames buffered per lagging subscriber before drops.
const CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Hub
// ============================================================================

/// Broadcast hub for live text frames.
#[derive(Debug)]
pub struct StreamHub {
    /// Frame fan-out channel.
    tx: broadcast::Sender<String>,
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHub {
    /// Creates a hub with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribes a new connection to the frame stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Returns the number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Serializes and broadcasts one frame. Errors only mean nobody is
    /// listening, which is fine.
    pub fn send_frame(&self, frame: &impl Serialize) {
        if let Ok(text) = serde_json::to_string(frame) {
            let _ = self.tx.send(text);
        }
    }
}

impl LiveUpdateSink for StreamHub {
    fn frame_committed(&self, frame: &LiveFrame) {
        self.send_frame(frame);
    }
}

impl EditorBridge for StreamHub {
    fn dispatch(&self, order: &DispatchOrder) {
        self.send_frame(&json!({
            "type": "test_dispatch",
            "runId": order.run_id,
            "attempt": order.attempt,
            "scenario": order.scenario,
        }));
    }

    fn abort(&self, run_id: &str, attempt: u32) {
        self.send_frame(&json!({
            "type": "test_abort",
            "runId": run_id,
            "attempt": attempt,
        }));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use scene_hub_core::interfaces::LiveFrame;
    use scene_hub_core::interfaces::LiveUpdateSink;

    use super::StreamHub;

    #[test]
    fn subscribers_receive_committed_frames_in_order() {
        let hub = StreamHub::new();
        let mut rx = hub.subscribe();
        hub.frame_committed(&LiveFrame::FullSync {
            revision: 1,
            instances: Vec::new(),
        });
        hub.frame_committed(&LiveFrame::FullSync {
            revision: 2,
            instances: Vec::new(),
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(first.contains("\"revision\":1"));
        assert!(second.contains("\"revision\":2"));
    }

    #[test]
    fn sends_without_subscribers_are_dropped_silently() {
        let hub = StreamHub::new();
        hub.frame_committed(&LiveFrame::FullSync {
            revision: 1,
            instances: Vec::new(),
        });
        assert_eq!(hub.subscriber_count(), 0);
    }
}
