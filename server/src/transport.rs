//! Datagram transports the tick orchestrator reads from and writes to.
//!
//! A step drains whatever [`Transport::receive`] has buffered and never
//! blocks. [`ChannelTransport`] bridges to the tokio socket tasks in
//! `network`, while [`MemoryTransport`] keeps both directions in memory so
//! tests can play the client side.

use crate::error::TransportError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::sync::mpsc;

/// Raw payload tagged with the remote endpoint (sender or destination).
pub type Datagram = (SocketAddr, Vec<u8>);

pub trait Transport {
    fn send(&mut self, addr: SocketAddr, data: Vec<u8>) -> Result<(), TransportError>;

    /// Next buffered inbound datagram, if any. Never waits.
    fn receive(&mut self) -> Option<Datagram>;
}

/// Transport backed by unbounded tokio channels.
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Datagram>,
    outbound: mpsc::UnboundedSender<Datagram>,
}

/// The socket-facing halves of a [`ChannelTransport`].
pub struct ChannelEnds {
    /// Feed received datagrams here.
    pub inbound_tx: mpsc::UnboundedSender<Datagram>,
    /// Datagrams the server wants on the wire.
    pub outbound_rx: mpsc::UnboundedReceiver<Datagram>,
}

impl ChannelTransport {
    pub fn new() -> (Self, ChannelEnds) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        (
            Self { inbound, outbound },
            ChannelEnds {
                inbound_tx,
                outbound_rx,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, addr: SocketAddr, data: Vec<u8>) -> Result<(), TransportError> {
        self.outbound
            .send((addr, data))
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self) -> Option<Datagram> {
        self.inbound.try_recv().ok()
    }
}

#[derive(Debug, Default)]
struct Queues {
    inbound: VecDeque<Datagram>,
    outbound: VecDeque<Datagram>,
}

/// In-memory transport. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    queues: Rc<RefCell<Queues>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a datagram as if `from` had sent it to the server.
    pub fn client_enqueue(&self, from: SocketAddr, data: Vec<u8>) {
        self.queues.borrow_mut().inbound.push_back((from, data));
    }

    /// Oldest datagram the server has sent and nobody consumed yet.
    pub fn client_dequeue(&self) -> Option<Datagram> {
        self.queues.borrow_mut().outbound.pop_front()
    }

    /// Removes and returns every sent datagram in send order.
    pub fn drain_sent(&self) -> Vec<Datagram> {
        self.queues.borrow_mut().outbound.drain(..).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.queues.borrow().outbound.len()
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, addr: SocketAddr, data: Vec<u8>) -> Result<(), TransportError> {
        self.queues.borrow_mut().outbound.push_back((addr, data));
        Ok(())
    }

    fn receive(&mut self) -> Option<Datagram> {
        self.queues.borrow_mut().inbound.pop_front()
    }
}
