//! Inbound use-entity interception
//!
//! The interceptor sits in a player's pipeline just before the host's packet
//! handler. It reports clicks on entities to a [`PacketListener`] and always
//! forwards the frame unchanged, whether or not it could decode it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, trace, warn};

use crate::metrics::Metrics;
use crate::net::connection::PlayerId;
use crate::net::pipeline::{Frame, InboundHandler};
use crate::protocol::{Hand, PacketBuilder, UseEntityAction};

/// Receives entity clicks decoded from a player's inbound traffic.
///
/// Called on the player's connection event loop: keep it short and hand real
/// work to another task. A panic is caught and logged; the frame still
/// reaches the host.
pub trait PacketListener: Send + Sync {
    fn on_attack(&self, player: PlayerId, entity_id: i32);

    fn on_interact_main(&self, player: PlayerId, entity_id: i32);
}

/// Listener built from two closures
pub struct CallbackListener<A, I> {
    on_attack: A,
    on_interact: I,
}

impl<A, I> CallbackListener<A, I>
where
    A: Fn(PlayerId, i32) + Send + Sync,
    I: Fn(PlayerId, i32) + Send + Sync,
{
    pub fn new(on_attack: A, on_interact: I) -> Self {
        Self {
            on_attack,
            on_interact,
        }
    }
}

impl<A, I> PacketListener for CallbackListener<A, I>
where
    A: Fn(PlayerId, i32) + Send + Sync,
    I: Fn(PlayerId, i32) + Send + Sync,
{
    fn on_attack(&self, player: PlayerId, entity_id: i32) {
        (self.on_attack)(player, entity_id)
    }

    fn on_interact_main(&self, player: PlayerId, entity_id: i32) {
        (self.on_interact)(player, entity_id)
    }
}

/// Pipeline stage translating use-entity frames into listener calls
pub struct InboundInterceptor {
    player: PlayerId,
    builder: PacketBuilder,
    listener: Arc<dyn PacketListener>,
    metrics: Arc<Metrics>,
}

impl InboundInterceptor {
    pub fn new(
        player: PlayerId,
        builder: PacketBuilder,
        listener: Arc<dyn PacketListener>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            player,
            builder,
            listener,
            metrics,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    fn dispatch(&self, frame: &Frame) {
        let use_entity = match self.builder.decode_use_entity(frame) {
            Ok(use_entity) => use_entity,
            Err(e) => {
                Metrics::incr(&self.metrics.decode_failures);
                warn!(player = %self.player, "Failed to decode use-entity frame: {}", e);
                return;
            }
        };

        trace!(player = %self.player, target = use_entity.target, action = ?use_entity.action, "Use-entity");

        let (event, outcome) = match use_entity.action {
            UseEntityAction::Attack => {
                Metrics::incr(&self.metrics.attack_events);
                let listener = &self.listener;
                let (player, target) = (self.player, use_entity.target);
                ("attack", panic::catch_unwind(AssertUnwindSafe(|| listener.on_attack(player, target))))
            }
            UseEntityAction::Interact { hand: Hand::Main } => {
                Metrics::incr(&self.metrics.interact_events);
                let listener = &self.listener;
                let (player, target) = (self.player, use_entity.target);
                ("interact", panic::catch_unwind(AssertUnwindSafe(|| listener.on_interact_main(player, target))))
            }
            // Off-hand clicks and positioned interacts arrive alongside a
            // main-hand interact; reporting them would double-fire.
            UseEntityAction::Interact { hand: Hand::Off } | UseEntityAction::InteractAt { .. } => return,
        };

        if let Err(payload) = outcome {
            Metrics::incr(&self.metrics.listener_failures);
            error!(
                player = %self.player,
                target = use_entity.target,
                "Entity {} listener panicked: {}",
                event,
                panic_message(&*payload)
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl InboundHandler for InboundInterceptor {
    fn channel_read(&mut self, frame: Frame) -> Option<Frame> {
        if self.builder.is_use_entity(&frame) {
            Metrics::incr(&self.metrics.frames_intercepted);
            self.dispatch(&frame);
        }
        Some(frame)
    }
}
