//! Key layout of the shared store.
//!
//! Per-node execution keys exist in two namespaces: the namespaced
//! `devices:{device}:{node}:…` form and the legacy `{node}:…` form, which is
//! shared by every device running that node.

use crate::types::SubjectId;

pub const DEVICES_LIST: &str = "devices:list";

pub fn device_nodes(device: &str) -> String {
    format!("devices:{device}:nodes")
}

pub fn device_heartbeat(device: &str) -> String {
    format!("devices:{device}:heartbeat")
}

pub fn status(subject: &SubjectId) -> String {
    format!("devices:{}:{}:status", subject.device, subject.node)
}

pub fn execution_history(subject: &SubjectId) -> String {
    format!("devices:{}:{}:execution_history", subject.device, subject.node)
}

pub fn execution_time(subject: &SubjectId) -> String {
    format!("devices:{}:{}:execution_time", subject.device, subject.node)
}

pub fn start_execution(subject: &SubjectId) -> String {
    format!("devices:{}:{}:start_execution", subject.device, subject.node)
}

pub fn legacy_execution_time(node: &str) -> String {
    format!("{node}:execution_time")
}

pub fn legacy_start_execution(node: &str) -> String {
    format!("{node}:start_execution")
}

pub fn node_logs(node: &str) -> String {
    format!("{node}:logs")
}

/// Control channel consumed by a device's orchestrator.
pub fn orchestrator_channel(device: &str) -> String {
    format!("{device}-orchestrator")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_and_legacy_keys() {
        let s = SubjectId::new("Device1", "Plan");
        assert_eq!(execution_time(&s), "devices:Device1:Plan:execution_time");
        assert_eq!(start_execution(&s), "devices:Device1:Plan:start_execution");
        assert_eq!(legacy_execution_time("Plan"), "Plan:execution_time");
        assert_eq!(legacy_start_execution("Plan"), "Plan:start_execution");
        assert_eq!(status(&s), "devices:Device1:Plan:status");
        assert_eq!(execution_history(&s), "devices:Device1:Plan:execution_history");
    }

    #[test]
    fn test_orchestrator_channel_name() {
        assert_eq!(orchestrator_channel("Device3"), "Device3-orchestrator");
    }
}
