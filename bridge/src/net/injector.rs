//! Installs and removes the interceptor stage in player pipelines
//!
//! Both operations are fire-and-forget: they queue a task on the target
//! connection's event loop and return immediately. Because every mutation of
//! one pipeline runs on that one loop, repeated or racing calls serialize and
//! a pipeline never holds two interceptor stages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::metrics::Metrics;
use crate::net::connection::{ConnectionHandle, PipelineTask};
use crate::net::packet::PacketSink;
use crate::net::pipeline::{Frame, InboundHandler, Pipeline, PipelineError};

/// Default name of the interceptor stage
pub const DEFAULT_HANDLER_NAME: &str = "entity_bridge_listener";

/// Identifies one `inject` call's interceptor instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle(u64);

/// What the injector has been asked to keep on one connection.
///
/// Bindings of closed connections are pruned on every injector call.
#[derive(Debug, Clone)]
pub struct ConnectionBinding {
    pub connection: ConnectionHandle,
    /// `None` unless interception was injected, and neither removed since nor
    /// rejected by the pipeline
    pub interceptor: Option<InterceptorHandle>,
}

type BindingMap = Mutex<HashMap<u64, ConnectionBinding>>;

/// Wraps an installed handler so the active gauge follows the stage's
/// lifetime: removal, replacement and the pipeline being dropped on
/// disconnect all release it.
struct InstalledStage {
    inner: Box<dyn InboundHandler>,
    metrics: Arc<Metrics>,
}

impl InstalledStage {
    fn new(inner: Box<dyn InboundHandler>, metrics: Arc<Metrics>) -> Self {
        Metrics::incr(&metrics.interceptors_active);
        Self { inner, metrics }
    }
}

impl InboundHandler for InstalledStage {
    fn channel_read(&mut self, frame: Frame) -> Option<Frame> {
        self.inner.channel_read(frame)
    }
}

impl Drop for InstalledStage {
    fn drop(&mut self) {
        Metrics::decr(&self.metrics.interceptors_active);
    }
}

pub struct PipelineInjector {
    handler_name: Arc<str>,
    anchor: Arc<str>,
    // Keyed by connection id. The lock is held while queueing so binding
    // order and event loop order agree.
    bindings: Arc<BindingMap>,
    next_handle: AtomicU64,
    metrics: Arc<Metrics>,
}

impl PipelineInjector {
    pub fn new(handler_name: &str, anchor: &str, metrics: Arc<Metrics>) -> Self {
        Self {
            handler_name: Arc::from(handler_name),
            anchor: Arc::from(anchor),
            bindings: Arc::new(Mutex::new(HashMap::new())),
            next_handle: AtomicU64::new(1),
            metrics,
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Binding for a connection, if the injector has seen it and it is still open
    pub fn binding(&self, connection: &ConnectionHandle) -> Option<ConnectionBinding> {
        let mut bindings = self.bindings.lock();
        prune_closed(&mut bindings);
        bindings.get(&connection.id()).cloned()
    }

    /// Number of open connections with an interceptor requested
    pub fn bound_count(&self) -> usize {
        let mut bindings = self.bindings.lock();
        prune_closed(&mut bindings);
        bindings
            .values()
            .filter(|binding| binding.interceptor.is_some())
            .count()
    }

    /// Queue insertion of `handler` before the anchor stage, replacing any
    /// stage already installed under the handler name.
    ///
    /// Returns the new interceptor's handle, or `None` if the connection is
    /// closed; nothing is queued then. If the pipeline later rejects the
    /// stage, the binding drops back to no interceptor.
    pub fn inject(
        &self,
        connection: &ConnectionHandle,
        handler: Box<dyn InboundHandler>,
    ) -> Option<InterceptorHandle> {
        let conn_id = connection.id();
        let mut bindings = self.bindings.lock();
        prune_closed(&mut bindings);

        let handle = InterceptorHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        if !connection.execute(self.install_task(connection, handle, handler)) {
            bindings.remove(&conn_id);
            debug!(conn_id, "Skipping interceptor install on closed connection");
            return None;
        }

        bindings
            .entry(conn_id)
            .or_insert_with(|| ConnectionBinding {
                connection: connection.clone(),
                interceptor: None,
            })
            .interceptor = Some(handle);
        Some(handle)
    }

    /// Queue removal of the interceptor stage. Removing an absent stage is a no-op.
    ///
    /// Returns false if the connection is closed.
    pub fn uninject(&self, connection: &ConnectionHandle) -> bool {
        let conn_id = connection.id();
        let mut bindings = self.bindings.lock();
        prune_closed(&mut bindings);

        if !connection.is_open() {
            return false;
        }
        if let Some(binding) = bindings.get_mut(&conn_id) {
            binding.interceptor = None;
        }

        let name = self.handler_name.clone();
        let metrics = self.metrics.clone();
        connection.execute(Box::new(move |pipeline: &mut Pipeline| {
            if pipeline.remove(&name) {
                Metrics::incr(&metrics.pipeline_mutations);
                debug!(conn_id, "Interceptor removed");
            }
        }))
    }

    /// Forget a connection entirely, removing its interceptor if still open
    pub fn detach(&self, connection: &ConnectionHandle) {
        self.uninject(connection);
        self.bindings.lock().remove(&connection.id());
    }

    /// Drop bindings whose connection has closed, returning how many went
    pub fn cleanup_closed(&self) -> usize {
        prune_closed(&mut self.bindings.lock())
    }

    /// Whether the connection's pipeline currently holds the interceptor stage.
    ///
    /// Observes the pipeline after every mutation queued before the call.
    pub async fn is_injected(&self, connection: &ConnectionHandle) -> bool {
        let name = self.handler_name.clone();
        connection
            .with_pipeline(move |pipeline| pipeline.contains(&name))
            .await
            .unwrap_or(false)
    }

    fn install_task(
        &self,
        connection: &ConnectionHandle,
        handle: InterceptorHandle,
        handler: Box<dyn InboundHandler>,
    ) -> PipelineTask {
        let name = self.handler_name.clone();
        let anchor = self.anchor.clone();
        let metrics = self.metrics.clone();
        let bindings = Arc::downgrade(&self.bindings);
        let conn_id = connection.id();
        let player = connection.player_id();

        Box::new(move |pipeline: &mut Pipeline| {
            let replaced = pipeline.remove(&name);
            let stage = Box::new(InstalledStage::new(handler, metrics.clone()));
            match pipeline.add_before(&anchor, name.as_ref(), stage) {
                Ok(()) => {
                    Metrics::incr(&metrics.pipeline_mutations);
                    debug!(conn_id, %player, "Interceptor installed");
                }
                Err(e) => {
                    if replaced {
                        Metrics::incr(&metrics.pipeline_mutations);
                    }
                    release_failed(&bindings, conn_id, handle);
                    match e {
                        PipelineError::MissingAnchor(anchor) => error!(
                            conn_id,
                            %player,
                            "Cannot install interceptor: no '{}' stage in pipeline",
                            anchor
                        ),
                        other => error!(conn_id, %player, "Cannot install interceptor: {}", other),
                    }
                }
            }
        })
    }
}

fn prune_closed(bindings: &mut HashMap<u64, ConnectionBinding>) -> usize {
    let before = bindings.len();
    bindings.retain(|_, binding| binding.connection.is_open());
    before - bindings.len()
}

/// Clear a binding whose install was rejected, unless a later inject or
/// uninject already replaced it
fn release_failed(bindings: &Weak<BindingMap>, conn_id: u64, handle: InterceptorHandle) {
    let Some(bindings) = bindings.upgrade() else {
        return;
    };
    let mut bindings = bindings.lock();
    if let Some(binding) = bindings.get_mut(&conn_id) {
        if binding.interceptor == Some(handle) {
            binding.interceptor = None;
        }
    }
}
