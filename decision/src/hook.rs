use serde::{Deserialize, Serialize};

use crate::Decision;

pub const HOOK_EVENT_NAME: &str = "PermissionRequest";

/// JSON printed on stdout for the permission-request hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub decision: HookDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum HookDecision {
    Allow,
    Deny { message: String },
}

impl HookOutput {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<Decision> for HookOutput {
    fn from(decision: Decision) -> Self {
        let decision = match decision {
            Decision::Approve => HookDecision::Allow,
            Decision::Deny { message } => HookDecision::Deny { message },
        };
        HookOutput {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: HOOK_EVENT_NAME.to_string(),
                decision,
            },
        }
    }
}
