//! Per-device task queues with at-least-once delivery.
//!
//! A task stays visible to [`TaskQueueStore::fetch_pending`] until the device
//! acknowledges its id. Acknowledged ids are remembered in a per-device
//! executed set for as long as the device stays bound, so a redelivered copy
//! of an acknowledged task is filtered even if it is still physically queued.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CAPTURE_IMAGE_TASK_TYPE: &str = "CaptureImage";
pub const CAPTURE_IMAGE_NOW_TASK_TYPE: &str = "CaptureImageNow";
pub const HEARTBEAT_TASK_TYPE: &str = "HeartBeat";
pub const STOP_TASK_TYPE: &str = "StopTask";

/// Task types that never receive an automatic follow-up screenshot.
pub const AUTO_SCREENSHOT_EXEMPT_TASK_TYPES: &[&str] = &[
    CAPTURE_IMAGE_TASK_TYPE,
    CAPTURE_IMAGE_NOW_TASK_TYPE,
    HEARTBEAT_TASK_TYPE,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Immutable unit of work as delivered to the device.
pub struct QueuedTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl QueuedTask {
    fn new(task_type: &str, params: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: task_type.to_string(),
            params: params
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    Normal,
    Head,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQueuePolicy {
    pub auto_screenshot: bool,
}

impl Default for TaskQueuePolicy {
    fn default() -> Self {
        Self {
            auto_screenshot: true,
        }
    }
}

impl TaskQueuePolicy {
    fn wants_follow_up_screenshot(self, task_type: &str) -> bool {
        self.auto_screenshot && !AUTO_SCREENSHOT_EXEMPT_TASK_TYPES.contains(&task_type)
    }
}

#[derive(Debug, Default)]
pub struct TaskQueueStore {
    policy: TaskQueuePolicy,
    queues: HashMap<String, VecDeque<QueuedTask>>,
    executed: HashMap<String, HashSet<String>>,
}

impl TaskQueueStore {
    pub fn new(policy: TaskQueuePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> TaskQueuePolicy {
        self.policy
    }

    /// Queues a task and returns its id.
    ///
    /// With the auto-screenshot policy on, a non-exempt task is followed
    /// directly by a `CaptureImage` task that has its own id. This includes
    /// [`TaskPriority::Head`] tasks such as `StopTask`: the screenshot lands at
    /// index 1, right behind the head task, not at the tail.
    pub fn enqueue(
        &mut self,
        device_id: &str,
        task_type: &str,
        params: Option<&str>,
        priority: TaskPriority,
    ) -> String {
        let task = QueuedTask::new(task_type, params);
        let task_id = task.id.clone();
        let follow_up = self
            .policy
            .wants_follow_up_screenshot(task_type)
            .then(|| QueuedTask::new(CAPTURE_IMAGE_TASK_TYPE, None));

        let queue = self.queues.entry(device_id.to_string()).or_default();
        match priority {
            TaskPriority::Normal => {
                queue.push_back(task);
                if let Some(follow_up) = follow_up {
                    queue.push_back(follow_up);
                }
            }
            TaskPriority::Head => {
                if let Some(follow_up) = follow_up {
                    queue.push_front(follow_up);
                }
                queue.push_front(task);
            }
        }
        task_id
    }

    /// Queued tasks not yet acknowledged, in queue order.
    pub fn fetch_pending(&self, device_id: &str) -> Vec<QueuedTask> {
        let Some(queue) = self.queues.get(device_id) else {
            return Vec::new();
        };
        let executed = self.executed.get(device_id);
        queue
            .iter()
            .filter(|task| !executed.is_some_and(|ids| ids.contains(&task.id)))
            .cloned()
            .collect()
    }

    /// Marks `task_id` executed and drops every queued copy of it.
    /// Returns the number of queued entries removed.
    pub fn acknowledge(&mut self, device_id: &str, task_id: &str) -> usize {
        self.executed
            .entry(device_id.to_string())
            .or_default()
            .insert(task_id.to_string());

        let Some(queue) = self.queues.get_mut(device_id) else {
            return 0;
        };
        let before = queue.len();
        queue.retain(|task| task.id != task_id);
        let removed = before - queue.len();
        if queue.is_empty() {
            self.queues.remove(device_id);
        }
        removed
    }

    /// Number of tasks physically queued for the device.
    pub fn queued_len(&self, device_id: &str) -> usize {
        self.queues.get(device_id).map_or(0, VecDeque::len)
    }

    pub fn executed_len(&self, device_id: &str) -> usize {
        self.executed.get(device_id).map_or(0, HashSet::len)
    }

    /// Forgets the device's queue and executed set; used when its binding is removed.
    pub fn discard_device(&mut self, device_id: &str) {
        self.queues.remove(device_id);
        self.executed.remove(device_id);
    }
}
