//! Shared endpoint and protocol constant definitions for the dispatch server.

pub const GET_TASK_ENDPOINT: &str = "/maa/getTask";
pub const REPORT_STATUS_ENDPOINT: &str = "/maa/reportStatus";
pub(super) const IMAGE_PAYLOAD_MIN_CHARS: usize = 100;
