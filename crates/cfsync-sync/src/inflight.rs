//! In-flight upload registry
//!
//! A name is registered when its upload is queued and released when the
//! upload finishes (successfully or not) or is discarded at shutdown. While
//! registered, further upload requests for the same name are dropped.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use cfsync_core::domain::newtypes::RelativeName;

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    names: Mutex<HashSet<RelativeName>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> MutexGuard<'_, HashSet<RelativeName>> {
        match self.names.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers `name`; returns false if it was already in flight
    pub fn try_register(&self, name: &RelativeName) -> bool {
        self.names().insert(name.clone())
    }

    /// Releases `name`; returns false if it was not registered
    pub fn release(&self, name: &RelativeName) -> bool {
        self.names().remove(name)
    }

    pub fn contains(&self, name: &RelativeName) -> bool {
        self.names().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}
