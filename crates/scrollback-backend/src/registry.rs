//! Registration of history backends with the host

use crate::backend::HistoryBackend;
use crate::error::BackendError;

/// Named history backends available to the host.
///
/// The host registers each backend module under its name (`"mem"` for the
/// memory backend) and routes history operations through the registry. The
/// handful of backends makes a `Vec` the right shape.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<(String, Box<dyn HistoryBackend>)>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under `name`. Duplicate names are rejected.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Box<dyn HistoryBackend>,
    ) -> Result<(), BackendError> {
        let name = name.into();
        if self.backends.iter().any(|(n, _)| *n == name) {
            return Err(BackendError::DuplicateBackend(name));
        }
        self.backends.push((name, backend));
        Ok(())
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Option<&dyn HistoryBackend> {
        self.backends
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_ref())
    }

    /// Look up a backend by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn HistoryBackend + '_)> {
        self.backends
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(move |(_, b)| -> &mut (dyn HistoryBackend + '_) { b.as_mut() })
    }

    /// Names of all registered backends, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|(n, _)| n.as_str())
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
