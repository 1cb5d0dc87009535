//! Player connections as seen by the core
//!
//! Each connection owns one event loop task. The loop is the only place its
//! [`Pipeline`] is touched: inbound frames and pipeline mutation tasks are
//! queued to it and applied strictly in submission order. Outbound packets go
//! onto an unbounded queue so senders never wait on I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::net::packet::{Packet, PacketSink};
use crate::net::pipeline::{Frame, InboundHandler, Pipeline, HOST_PACKET_HANDLER};

pub type PlayerId = Uuid;

/// Mutation applied to a pipeline on its connection's event loop
pub type PipelineTask = Box<dyn FnOnce(&mut Pipeline) + Send>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

enum LoopEvent {
    Inbound(Frame),
    Execute(PipelineTask),
}

/// Traffic counters for one connection
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub frames_received: AtomicU64,
    /// Sends attempted after the connection closed
    pub packets_dropped: AtomicU64,
}

impl ConnectionStats {
    fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

struct Shared {
    id: u64,
    player_id: PlayerId,
    open: AtomicBool,
    closed: Notify,
    outbound: mpsc::UnboundedSender<Packet>,
    events: mpsc::UnboundedSender<LoopEvent>,
    stats: ConnectionStats,
}

/// Cheap, cloneable handle to a live player connection
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn player_id(&self) -> PlayerId {
        self.shared.player_id
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.shared.stats
    }

    /// Close the connection. The event loop stops and drops pending tasks.
    pub fn close(&self) {
        if self.shared.open.swap(false, Ordering::SeqCst) {
            debug!(conn_id = self.shared.id, "Connection closing");
            self.shared.closed.notify_one();
        }
    }

    /// Submit a pipeline task to this connection's event loop.
    ///
    /// Returns false when the loop is gone; the task is dropped unrun.
    pub fn execute(&self, task: PipelineTask) -> bool {
        if !self.is_open() {
            return false;
        }
        self.shared.events.send(LoopEvent::Execute(task)).is_ok()
    }

    /// Push a frame received from the client into the pipeline
    pub fn fire_inbound(&self, frame: Frame) -> bool {
        if !self.is_open() {
            return false;
        }
        self.shared.events.send(LoopEvent::Inbound(frame)).is_ok()
    }

    /// Run a read-only query against the pipeline on the event loop.
    ///
    /// Resolves after every task submitted before it has been applied.
    pub async fn with_pipeline<R, F>(&self, query: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&Pipeline) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let submitted = self.execute(Box::new(move |pipeline: &mut Pipeline| {
            let _ = tx.send(query(pipeline));
        }));
        if !submitted {
            return None;
        }
        rx.await.ok()
    }
}

impl PacketSink for ConnectionHandle {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn send_packet(&self, packet: Packet) {
        if !self.is_open() {
            self.shared.stats.record_dropped();
            return;
        }
        let bytes = packet.body().len();
        match self.shared.outbound.send(packet) {
            Ok(()) => self.shared.stats.record_sent(bytes),
            // Writer already gone: same as a closed connection
            Err(_) => self.shared.stats.record_dropped(),
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .field("player_id", &self.shared.player_id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Single-threaded execution context that owns a connection's pipeline
pub struct EventLoop {
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<LoopEvent>,
    pipeline: Pipeline,
}

impl EventLoop {
    /// Process events until the connection closes, then hand the pipeline back
    pub async fn run(mut self) -> Pipeline {
        loop {
            tokio::select! {
                biased;
                _ = self.shared.closed.notified() => break,
                event = self.events.recv() => match event {
                    Some(LoopEvent::Inbound(frame)) => {
                        self.shared.stats.frames_received.fetch_add(1, Ordering::Relaxed);
                        trace!(conn_id = self.shared.id, packet_id = frame.packet_id, "Inbound frame");
                        self.pipeline.fire_read(frame);
                    }
                    Some(LoopEvent::Execute(task)) => task(&mut self.pipeline),
                    None => break,
                },
            }
        }

        // Pending tasks are discarded unrun
        self.events.close();
        debug!(conn_id = self.shared.id, "Event loop stopped");
        self.pipeline
    }

    pub fn spawn(self) -> JoinHandle<Pipeline> {
        tokio::spawn(self.run())
    }
}

/// Everything the host keeps for one connection besides the handle
pub struct ConnectionParts {
    pub handle: ConnectionHandle,
    pub event_loop: EventLoop,
    /// Packets queued for the client, in send order
    pub outbound: mpsc::UnboundedReceiver<Packet>,
}

/// Create a connection around an existing pipeline
pub fn open(player_id: PlayerId, pipeline: Pipeline) -> ConnectionParts {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(Shared {
        id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        player_id,
        open: AtomicBool::new(true),
        closed: Notify::new(),
        outbound: outbound_tx,
        events: events_tx,
        stats: ConnectionStats::default(),
    });

    ConnectionParts {
        handle: ConnectionHandle {
            shared: shared.clone(),
        },
        event_loop: EventLoop {
            shared,
            events: events_rx,
            pipeline,
        },
        outbound: outbound_rx,
    }
}

/// Terminal stage standing in for the host's game packet handling
pub struct HostPacketHandler {
    forward: mpsc::UnboundedSender<Frame>,
}

impl HostPacketHandler {
    pub fn new(forward: mpsc::UnboundedSender<Frame>) -> Self {
        Self { forward }
    }
}

impl InboundHandler for HostPacketHandler {
    fn channel_read(&mut self, frame: Frame) -> Option<Frame> {
        let _ = self.forward.send(frame);
        None
    }
}

/// Pipeline containing only the host's packet handler, plus the receiver for
/// the frames that reach it
pub fn host_pipeline() -> (Pipeline, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut pipeline = Pipeline::new();
    // Empty pipeline, so the name cannot collide
    let _ = pipeline.add_last(HOST_PACKET_HANDLER, Box::new(HostPacketHandler::new(tx)));
    (pipeline, rx)
}

/// Registry of online player connections
pub struct ConnectionManager {
    connections: RwLock<HashMap<PlayerId, ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection, replacing any previous one for the same player
    pub fn insert(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.write().insert(handle.player_id(), handle)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<ConnectionHandle> {
        self.connections.read().get(&player_id).cloned()
    }

    pub fn remove(&self, player_id: PlayerId) -> Option<ConnectionHandle> {
        self.connections.write().remove(&player_id)
    }

    /// Snapshot of every registered connection
    pub fn online(&self) -> Vec<ConnectionHandle> {
        self.connections.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.connections.read().len()
    }

    /// Drop closed connections, returning their players
    pub fn cleanup_closed(&self) -> Vec<PlayerId> {
        let mut connections = self.connections.write();
        let closed: Vec<PlayerId> = connections
            .iter()
            .filter(|(_, handle)| !handle.is_open())
            .map(|(id, _)| *id)
            .collect();
        for id in &closed {
            connections.remove(id);
        }
        closed
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::{PacketGroup, PacketKind};
    use bytes::Bytes;

    fn packet(id: i32) -> Packet {
        Packet::new(PacketKind::Spawn, id, Bytes::from_static(&[0, 1, 2]))
    }

    #[tokio::test]
    async fn test_send_enqueues_in_order() {
        let (pipeline, _host_rx) = host_pipeline();
        let mut parts = open(Uuid::new_v4(), pipeline);

        PacketGroup::of([packet(1), packet(2), packet(3)]).send_to(&parts.handle);

        for expected in 1..=3 {
            assert_eq!(parts.outbound.recv().await.unwrap().id(), expected);
        }
        assert_eq!(parts.handle.stats().packets_sent.load(Ordering::Relaxed), 3);
        assert_eq!(parts.handle.stats().bytes_sent.load(Ordering::Relaxed), 9);
    }

    #[tokio::test]
    async fn test_send_after_close_is_noop() {
        let (pipeline, _host_rx) = host_pipeline();
        let mut parts = open(Uuid::new_v4(), pipeline);

        parts.handle.close();
        parts.handle.send_packet(packet(1));
        PacketGroup::single(packet(2)).send_to(&parts.handle);

        assert!(parts.outbound.try_recv().is_err());
        assert_eq!(parts.handle.stats().packets_dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_inbound_reaches_host_handler() {
        let (pipeline, mut host_rx) = host_pipeline();
        let parts = open(Uuid::new_v4(), pipeline);
        let handle = parts.handle.clone();
        let _loop = parts.event_loop.spawn();

        assert!(handle.fire_inbound(Frame::new(0x18, Bytes::from_static(&[1]))));

        let frame = host_rx.recv().await.unwrap();
        assert_eq!(frame.packet_id, 0x18);
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let (pipeline, _host_rx) = host_pipeline();
        let parts = open(Uuid::new_v4(), pipeline);
        let handle = parts.handle.clone();
        let _loop = parts.event_loop.spawn();

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = order.clone();
            handle.execute(Box::new(move |_| order.lock().push(i)));
        }
        handle.with_pipeline(|_| ()).await.unwrap();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_close_discards_pending_tasks() {
        let (pipeline, _host_rx) = host_pipeline();
        let parts = open(Uuid::new_v4(), pipeline);
        let handle = parts.handle.clone();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        handle.execute(Box::new(move |_| flag.store(true, Ordering::SeqCst)));
        handle.close();

        // Loop starts after close: the queued task must not run
        let pipeline = parts.event_loop.spawn().await.unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(pipeline.names(), vec![HOST_PACKET_HANDLER]);

        assert!(!handle.execute(Box::new(|_| {})));
        assert!(handle.with_pipeline(|p| p.len()).await.is_none());
    }

    #[test]
    fn test_dropped_event_loop_rejects_tasks() {
        let (pipeline, _host_rx) = host_pipeline();
        // Event loop never spawned and dropped with the parts
        let handle = open(Uuid::new_v4(), pipeline).handle;

        assert!(handle.is_open());
        assert!(!handle.execute(Box::new(|_| {})));
        assert!(tokio_test::block_on(handle.with_pipeline(|p| p.len())).is_none());
    }

    #[test]
    fn test_manager_cleanup_closed() {
        let manager = ConnectionManager::new();
        let (p1, _) = host_pipeline();
        let (p2, _) = host_pipeline();
        let a = open(Uuid::new_v4(), p1).handle;
        let b = open(Uuid::new_v4(), p2).handle;
        manager.insert(a.clone());
        manager.insert(b.clone());

        b.close();
        let removed = manager.cleanup_closed();

        assert_eq!(removed, vec![b.player_id()]);
        assert_eq!(manager.count(), 1);
        assert!(manager.get(a.player_id()).is_some());
    }
}
