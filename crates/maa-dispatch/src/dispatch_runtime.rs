//! Shared dispatch state: binding registry, task queues and presence.
//!
//! Lock order is registry, then queues, then presence. Operations that act
//! on a device's queue hold the registry lock for their whole duration so an
//! unbind can never interleave with an enqueue or acknowledgment for the same
//! device and leave a queue behind for an unbound device.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::binding_registry::{BindingError, BindingRegistry, DeviceBinding};
use crate::presence::{PresenceStatus, PresenceTracker};
use crate::task_queue::{QueuedTask, TaskPriority, TaskQueuePolicy, TaskQueueStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Unbound,
    Pending(Vec<QueuedTask>),
}

impl FetchOutcome {
    pub fn into_tasks(self) -> Vec<QueuedTask> {
        match self {
            Self::Unbound => Vec::new(),
            Self::Pending(tasks) => tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTask {
    pub device_id: String,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatusReport {
    pub device_id: String,
    pub presence: PresenceStatus,
    pub queued_tasks: usize,
}

#[derive(Debug)]
pub struct DispatchRuntime {
    registry: RwLock<BindingRegistry>,
    queues: RwLock<TaskQueueStore>,
    presence: RwLock<PresenceTracker>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl DispatchRuntime {
    pub fn new(registry: BindingRegistry, policy: TaskQueuePolicy) -> Self {
        Self {
            registry: RwLock::new(registry),
            queues: RwLock::new(TaskQueueStore::new(policy)),
            presence: RwLock::new(PresenceTracker::default()),
        }
    }

    pub fn bind_device(
        &self,
        operator_id: &str,
        device_id: &str,
        channel: &str,
    ) -> Result<DeviceBinding, BindingError> {
        let mut registry = write(&self.registry);
        let binding = registry.bind(operator_id, device_id, channel)?;
        write(&self.queues).discard_device(device_id);
        tracing::info!(operator = %operator_id, device = %device_id, "device bound");
        Ok(binding)
    }

    /// Removes the operator's binding and discards the device's queue and executed set.
    pub fn unbind_operator(&self, operator_id: &str) -> Result<String, BindingError> {
        let mut registry = write(&self.registry);
        let device_id = registry.unbind(operator_id)?;
        write(&self.queues).discard_device(&device_id);
        tracing::info!(operator = %operator_id, device = %device_id, "device unbound");
        Ok(device_id)
    }

    pub fn binding_for_operator(&self, operator_id: &str) -> Option<DeviceBinding> {
        read(&self.registry)
            .lookup_by_operator(operator_id)
            .cloned()
    }

    pub fn operator_for_device(&self, device_id: &str) -> Option<String> {
        read(&self.registry)
            .lookup_by_device(device_id)
            .map(str::to_string)
    }

    pub fn binding_count(&self) -> usize {
        read(&self.registry).len()
    }

    pub fn task_policy(&self) -> TaskQueuePolicy {
        read(&self.queues).policy()
    }

    pub fn enqueue_for_operator(
        &self,
        operator_id: &str,
        task_type: &str,
        params: Option<&str>,
        priority: TaskPriority,
    ) -> Result<EnqueuedTask, BindingError> {
        let registry = read(&self.registry);
        let Some(binding) = registry.lookup_by_operator(operator_id) else {
            return Err(BindingError::NotBound {
                operator_id: operator_id.to_string(),
            });
        };
        let task_id =
            write(&self.queues).enqueue(&binding.device_id, task_type, params, priority);
        tracing::debug!(
            operator = %operator_id,
            device = %binding.device_id,
            task = %task_id,
            task_type,
            "task queued"
        );
        Ok(EnqueuedTask {
            device_id: binding.device_id.clone(),
            task_id,
        })
    }

    /// Records a poll from the device and returns its unacknowledged tasks.
    pub fn fetch_tasks(&self, device_id: &str, now_unix_ms: u64) -> FetchOutcome {
        write(&self.presence).touch(device_id, now_unix_ms);
        let registry = read(&self.registry);
        if registry.lookup_by_device(device_id).is_none() {
            return FetchOutcome::Unbound;
        }
        FetchOutcome::Pending(read(&self.queues).fetch_pending(device_id))
    }

    /// Acknowledges a finished task and returns the binding to notify, if any.
    ///
    /// Reports from unbound devices succeed without touching queue state.
    pub fn acknowledge(&self, device_id: &str, task_id: &str) -> Option<DeviceBinding> {
        let registry = read(&self.registry);
        let operator_id = registry.lookup_by_device(device_id)?;
        let removed = write(&self.queues).acknowledge(device_id, task_id);
        tracing::debug!(device = %device_id, task = %task_id, removed, "task acknowledged");
        registry.lookup_by_operator(operator_id).cloned()
    }

    pub fn pending_tasks(&self, device_id: &str) -> Vec<QueuedTask> {
        read(&self.queues).fetch_pending(device_id)
    }

    pub fn device_status(&self, operator_id: &str, now_unix_ms: u64) -> Option<DeviceStatusReport> {
        let registry = read(&self.registry);
        let binding = registry.lookup_by_operator(operator_id)?;
        let queued_tasks = read(&self.queues).queued_len(&binding.device_id);
        let presence = read(&self.presence).classify(&binding.device_id, now_unix_ms);
        tracing::debug!(
            operator = %operator_id,
            device = %binding.device_id,
            presence = presence.as_str(),
            queued_tasks,
            "device status"
        );
        Some(DeviceStatusReport {
            device_id: binding.device_id.clone(),
            presence,
            queued_tasks,
        })
    }
}
