//! The ordered, bidirectional message channel.
//!
//! [`pair`] returns the two endpoints of one channel: one for the app
//! context, one for the privileged context. Each direction is an unbounded
//! FIFO of JSON frames, so sends never wait and nothing is dropped or
//! coalesced.
//!
//! Both endpoints share one closed flag. Closing either end, or dropping
//! every sender of one direction, closes the channel for both: pending
//! `recv` calls return `None`, frames still queued are not delivered and
//! further sends fail with `ChannelClosed`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::message::Message;

#[derive(Clone)]
struct Link(Arc<watch::Sender<bool>>);

impl Link {
    fn new() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }

    fn close(&self) {
        if !self.0.send_replace(true) {
            debug!("channel closed");
        }
    }

    fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.0.subscribe();
        // An error means the flag's owner is gone, which is closed too.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Create a connected pair of endpoints.
pub fn pair() -> (Endpoint, Endpoint) {
    let link = Link::new();
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = Endpoint {
        sender: EndpointSender {
            tx: a_tx,
            link: link.clone(),
        },
        receiver: EndpointReceiver {
            rx: b_rx,
            link: link.clone(),
        },
    };
    let b = Endpoint {
        sender: EndpointSender {
            tx: b_tx,
            link: link.clone(),
        },
        receiver: EndpointReceiver { rx: a_rx, link },
    };
    (a, b)
}

/// One end of a channel.
pub struct Endpoint {
    sender: EndpointSender,
    receiver: EndpointReceiver,
}

impl Endpoint {
    pub fn sender(&self) -> EndpointSender {
        self.sender.clone()
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.sender.send(message)
    }

    pub async fn recv(&mut self) -> Option<Result<Message>> {
        self.receiver.recv().await
    }

    pub fn close(&self) {
        self.sender.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn split(self) -> (EndpointSender, EndpointReceiver) {
        (self.sender, self.receiver)
    }
}

/// Sending half of an endpoint. Cheap to clone.
#[derive(Clone)]
pub struct EndpointSender {
    tx: mpsc::UnboundedSender<String>,
    link: Link,
}

impl EndpointSender {
    /// Queue a message for the peer. Never waits.
    pub fn send(&self, message: &Message) -> Result<()> {
        if self.link.is_closed() {
            return Err(BridgeError::ChannelClosed);
        }
        let frame = message.to_frame()?;
        trace!(bytes = frame.len(), "send frame");
        self.tx.send(frame).map_err(|_| {
            self.link.close();
            BridgeError::ChannelClosed
        })
    }

    /// Close the channel for both endpoints.
    pub fn close(&self) {
        self.link.close();
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Resolves once the channel is closed.
    pub async fn closed(&self) {
        self.link.closed().await
    }
}

/// Receiving half of an endpoint.
pub struct EndpointReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    link: Link,
}

impl EndpointReceiver {
    /// Next message from the peer, in send order. `None` once the channel is
    /// closed. A frame that fails to decode yields `Some(Err(Codec))` and
    /// the channel stays open.
    pub async fn recv(&mut self) -> Option<Result<Message>> {
        if self.link.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.link.closed() => None,
            frame = self.rx.recv() => match frame {
                Some(frame) => {
                    trace!(bytes = frame.len(), "recv frame");
                    Some(Message::from_frame(&frame))
                }
                None => {
                    self.link.close();
                    None
                }
            },
        }
    }

    pub fn close(&self) {
        self.link.close();
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }
}
