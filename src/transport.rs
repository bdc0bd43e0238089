//! The transport interface the replica core consumes. Addressing, framing,
//! and the wire codec are all owned by whoever implements this trait; the
//! core only ever speaks in replica indices and [`Message`](crate::messages::Message) values.
use crate::instance::ClientAddress;
use crate::messages::Message;

/// Sends messages to peers and clients. Sends are fire-and-forget: the core
/// never blocks waiting for delivery, and never retries at this layer
/// (`timers.rs` owns retry scheduling).
pub trait Transport {
    fn send(&mut self, to: i32, msg: Message);

    fn broadcast(&mut self, to: &[i32], msg: Message) {
        for &peer in to {
            self.send(peer, msg.clone());
        }
    }

    /// Client addresses are a distinct namespace from replica indices, so
    /// replies to them go through their own method.
    fn reply_client(&mut self, to: ClientAddress, msg: Message);
}

/// A transport that records every send instead of delivering it, for tests
/// that want to assert on what a replica would have sent.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Vec<(i32, Message)>,
    pub client_replies: Vec<(ClientAddress, Message)>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, to: i32, msg: Message) {
        self.sent.push((to, msg));
    }

    fn reply_client(&mut self, to: ClientAddress, msg: Message) {
        self.client_replies.push((to, msg));
    }
}
