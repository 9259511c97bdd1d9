use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{RegistryError, TaskType};
use crate::ports::TaskHandler;

/// Registry of handlers (task_type -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable, shared behind an `Arc`).
/// - One handler may serve several task types (the three clone steps).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a task type.
    pub fn register(
        &mut self,
        task_type: TaskType,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.handlers.insert(task_type, handler);
        Ok(())
    }

    /// Register the same handler for every type in `task_types`.
    ///
    /// Nothing is registered if any of the types is already taken.
    pub fn register_all(
        &mut self,
        task_types: &[TaskType],
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        if let Some(taken) = task_types.iter().find(|t| self.handlers.contains_key(t)) {
            return Err(RegistryError::AlreadyRegistered(*taken));
        }
        for task_type in task_types {
            self.handlers.insert(*task_type, Arc::clone(&handler));
        }
        Ok(())
    }

    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type)
    }

    /// Registered task types in declaration order.
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
