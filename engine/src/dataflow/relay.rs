//! Event streaming Relay
//!
//! Carries engine notifications to the UI side over an unbounded channel, so
//! publishing never blocks the engine.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::panic::Location;
use std::sync::{Arc, OnceLock};

/// One-way event channel with exactly one emitting call site.
///
/// Named `{source}_{event}_relay`, e.g. `timeline_event_relay`. Debug builds
/// remember the first call site of [`Relay::send`] and panic when a second
/// one shows up, so every event stays traceable to one place in the engine.
#[derive(Clone, Debug)]
pub struct Relay<T> {
    sender: UnboundedSender<T>,
    emit_location: Arc<OnceLock<&'static Location<'static>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("relay sent from {current} after it was bound to {previous}")]
pub struct MultipleEmitters {
    pub previous: &'static Location<'static>,
    pub current: &'static Location<'static>,
}

impl<T: Send + 'static> Relay<T> {
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (
            Relay {
                sender,
                emit_location: Arc::new(OnceLock::new()),
            },
            receiver,
        )
    }

    /// Bind the relay to `caller` on first use; reject any other call site afterwards.
    fn bind_emitter(&self, caller: &'static Location<'static>) -> Result<(), MultipleEmitters> {
        let bound = *self.emit_location.get_or_init(|| caller);
        if bound == caller {
            Ok(())
        } else {
            Err(MultipleEmitters {
                previous: bound,
                current: caller,
            })
        }
    }

    /// Send an event. Dropped silently once nobody listens anymore.
    ///
    /// Panics in debug builds when called from a second call site.
    #[track_caller]
    pub fn send(&self, value: T) {
        let caller = Location::caller();
        if cfg!(debug_assertions) {
            if let Err(e) = self.bind_emitter(caller) {
                panic!("{}", e);
            }
        }

        if self.sender.unbounded_send(value).is_err() {
            log::trace!("Relay event from {} dropped, receiver gone", caller);
        }
    }
}

pub fn relay<T: Send + 'static>() -> (Relay<T>, UnboundedReceiver<T>) {
    Relay::new()
}
