//! Subset of the vSphere managed object model used by the janitor, as
//! serialized by the VI/JSON API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a managed object, e.g. `{"type": "Folder", "value": "group-v3"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "_typeName", default = "mor_type_name", skip_serializing_if = "String::is_empty")]
    pub type_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

fn mor_type_name() -> String {
    "ManagedObjectReference".to_string()
}

impl ManagedObjectReference {
    pub fn is_folder(&self) -> bool {
        self.kind == "Folder"
    }

    pub fn is_virtual_machine(&self) -> bool {
        self.kind == "VirtualMachine"
    }
}

/// `VirtualMachineConfigInfo`, reduced to identity fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfigInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
}

/// `VirtualMachineSummary`, reduced to runtime and quick stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSummary {
    #[serde(default)]
    pub runtime: VmRuntimeInfo,
    #[serde(default)]
    pub quick_stats: VmQuickStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmRuntimeInfo {
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub boot_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmQuickStats {
    #[serde(default)]
    pub uptime_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    PoweredOn,
    #[default]
    PoweredOff,
    Suspended,
    #[serde(other)]
    Unknown,
}

/// `TaskInfo`, reduced to state and error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub state: TaskState,
    #[serde(default)]
    pub error: Option<MethodFault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

/// `LocalizedMethodFault`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodFault {
    #[serde(default)]
    pub localized_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindByInventoryPathRequest<'a> {
    pub inventory_path: &'a str,
}
