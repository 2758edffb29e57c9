// SPDX-License-Identifier: MIT
//
// Shutdown coordination between the render and input loops.
//
// Whichever loop ends first calls `stop_all` from its cleanup, which stops
// every registered engine, itself included. Every engine's `stop` is
// idempotent, so the cascade coming back around is harmless.
//
// The coordinator holds weak references: engines own their coordinator
// handle, not the other way round.

use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something the coordinator can stop.
pub trait Stoppable: Send + Sync {
    /// Request a stop. Must be idempotent and safe to call from any thread.
    fn stop(&self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// The shared "stop everything" switch.
#[derive(Default)]
pub struct Coordinator {
    engines: Mutex<Vec<Weak<dyn Stoppable>>>,
}

impl Coordinator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an engine to the set `stop_all` reaches.
    pub fn register(&self, engine: &Arc<dyn Stoppable>) {
        log::debug!("registered {}", engine.name());
        self.lock().push(Arc::downgrade(engine));
    }

    /// Stop every registered engine that is still alive.
    ///
    /// The list is snapshotted first and the engines are stopped without
    /// the lock held, since a `stop` may itself call back into `stop_all`.
    pub fn stop_all(&self) {
        let engines: Vec<_> = self.lock().iter().filter_map(Weak::upgrade).collect();
        for engine in engines {
            log::debug!("stopping {}", engine.name());
            engine.stop();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Weak<dyn Stoppable>>> {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
