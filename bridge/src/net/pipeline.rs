//! Per-connection chain of named inbound handlers
//!
//! A pipeline is owned by exactly one connection event loop; nothing else
//! touches it. Handlers see each inbound frame in order and decide whether
//! to pass it on.

use bytes::Bytes;

/// Name of the host's own packet-handling stage
pub const HOST_PACKET_HANDLER: &str = "packet_handler";

/// Errors from pipeline mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("No handler named '{0}' to insert before")]
    MissingAnchor(String),
    #[error("Handler '{0}' is already in the pipeline")]
    DuplicateName(String),
}

/// One inbound frame: host packet id plus body, already de-framed by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_id: i32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(packet_id: i32, body: Bytes) -> Self {
        Self { packet_id, body }
    }
}

/// Stage in the inbound pipeline
pub trait InboundHandler: Send {
    /// Handle a frame. Return it to forward to the next stage, `None` to swallow it.
    fn channel_read(&mut self, frame: Frame) -> Option<Frame>;
}

struct NamedHandler {
    name: String,
    handler: Box<dyn InboundHandler>,
}

/// Ordered list of named handlers
#[derive(Default)]
pub struct Pipeline {
    handlers: Vec<NamedHandler>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.handlers.iter().position(|h| h.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Handler names, first stage first
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Append a handler as the last stage
    pub fn add_last(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn InboundHandler>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(PipelineError::DuplicateName(name));
        }
        self.handlers.push(NamedHandler { name, handler });
        Ok(())
    }

    /// Insert a handler immediately before `anchor`
    pub fn add_before(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        handler: Box<dyn InboundHandler>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(PipelineError::DuplicateName(name));
        }
        let index = self
            .position(anchor)
            .ok_or_else(|| PipelineError::MissingAnchor(anchor.to_string()))?;
        self.handlers.insert(index, NamedHandler { name, handler });
        Ok(())
    }

    /// Remove a handler by name. Returns false if it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Run a frame through every stage until one swallows it
    pub fn fire_read(&mut self, frame: Frame) {
        let mut current = Some(frame);
        for stage in &mut self.handlers {
            match current.take() {
                Some(frame) => current = stage.handler.channel_read(frame),
                None => return,
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("handlers", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records the packet ids it sees under its name
    struct Tap {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, i32)>>>,
        swallow: bool,
    }

    impl InboundHandler for Tap {
        fn channel_read(&mut self, frame: Frame) -> Option<Frame> {
            self.log.lock().push((self.name, frame.packet_id));
            if self.swallow {
                None
            } else {
                Some(frame)
            }
        }
    }

    fn tap(name: &'static str, log: &Arc<Mutex<Vec<(&'static str, i32)>>>, swallow: bool) -> Box<dyn InboundHandler> {
        Box::new(Tap {
            name,
            log: log.clone(),
            swallow,
        })
    }

    #[test]
    fn test_add_before_anchor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_last("decoder", tap("decoder", &log, false)).unwrap();
        pipeline.add_last(HOST_PACKET_HANDLER, tap("host", &log, false)).unwrap();

        pipeline.add_before(HOST_PACKET_HANDLER, "listener", tap("listener", &log, false)).unwrap();

        assert_eq!(pipeline.names(), vec!["decoder", "listener", HOST_PACKET_HANDLER]);
    }

    #[test]
    fn test_add_before_missing_anchor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();

        let result = pipeline.add_before(HOST_PACKET_HANDLER, "listener", tap("listener", &log, false));
        assert_eq!(result, Err(PipelineError::MissingAnchor(HOST_PACKET_HANDLER.to_string())));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_last("a", tap("a", &log, false)).unwrap();

        assert_eq!(
            pipeline.add_last("a", tap("a", &log, false)),
            Err(PipelineError::DuplicateName("a".to_string()))
        );
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_last("a", tap("a", &log, false)).unwrap();

        assert!(pipeline.remove("a"));
        assert!(!pipeline.remove("a"));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_fire_read_order_and_swallow() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_last("first", tap("first", &log, false)).unwrap();
        pipeline.add_last("gate", tap("gate", &log, true)).unwrap();
        pipeline.add_last("last", tap("last", &log, false)).unwrap();

        pipeline.fire_read(Frame::new(0x10, Bytes::new()));

        assert_eq!(*log.lock(), vec![("first", 0x10), ("gate", 0x10)]);
    }
}
