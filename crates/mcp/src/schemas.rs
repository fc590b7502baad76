use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for the `call` tool.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Operation or intent name as returned by `list_operations`.
    #[schemars(description = "Operation or intent name as returned by list_operations, for example: 'get_mails'.")]
    pub operation: String,
    /// Arguments keyed by parameter name. Missing dependent parameters are resolved automatically.
    #[schemars(
        description = "Arguments keyed by parameter name. Omit parameters the description marks as resolved automatically; selector aliases may be passed instead."
    )]
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}
