//! Tools and their parameter schemas.

use serde::{Deserialize, Serialize};

use crate::content::ContentItem;

/// The JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Number (integer or float; JSON does not distinguish).
    Number,
    /// Boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl ParamType {
    /// The JSON-Schema `type` name for this parameter type.
    #[must_use]
    pub const fn schema_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One parameter of a [`Tool`]'s input schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamSchema {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether callers must supply this parameter.
    pub required: bool,
}

impl ParamSchema {
    /// Construct a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: true,
        }
    }

    /// Construct an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named procedure with a typed parameter schema, exposed by a server.
/// Tool names must be non-empty and unique within a registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tool {
    /// Tool name. Non-empty, unique among registered tools.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameter schema.
    pub params: Vec<ParamSchema>,
}

impl Tool {
    /// Construct a tool with no parameters.
    ///
    /// # Panics
    /// Panics if `name` is empty or whitespace-only.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "tool name must not be empty");
        Self {
            name,
            description: None,
            params: Vec::new(),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Render this tool's JSON-Schema-like `inputSchema` object for
    /// `list_tools`: `{ type: "object", properties: {...}, required:
    /// [name*] }`, omitting `required` if empty.
    #[must_use]
    pub fn input_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut prop = serde_json::Map::new();
            prop.insert(
                "type".to_string(),
                serde_json::Value::String(param.param_type.schema_name().to_string()),
            );
            if let Some(desc) = &param.description {
                prop.insert("description".to_string(), serde_json::Value::String(desc.clone()));
            }
            properties.insert(param.name.clone(), serde_json::Value::Object(prop));
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), serde_json::Value::String("object".to_string()));
        schema.insert("properties".to_string(), serde_json::Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), serde_json::Value::Array(required));
        }
        serde_json::Value::Object(schema)
    }
}

/// Wire shape of one tool entry in `list_tools`'s result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    /// Tool name.
    pub name: String,
    /// Description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema-like input schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl From<&Tool> for ToolListing {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema(),
        }
    }
}

/// Result of `list_tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ListToolsResult {
    /// Registered tools.
    pub tools: Vec<ToolListing>,
}

/// Result of `call_tool`: `{ content: [...], isError: bool }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content produced by the tool handler.
    pub content: Vec<ContentItem>,
    /// Whether the handler reported failure.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Construct a successful result.
    #[must_use]
    pub fn ok(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Construct a failed result.
    #[must_use]
    pub fn error(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_schema_lists_required_params_only() {
        let tool = Tool::new("echo")
            .with_param(ParamSchema::required("text", ParamType::String))
            .with_param(ParamSchema::optional("upper", ParamType::Boolean));
        let schema = tool.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["text"]));
        assert_eq!(schema["properties"]["text"]["type"], "string");
    }

    #[test]
    fn input_schema_omits_required_key_when_empty() {
        let tool = Tool::new("ping");
        let schema = tool.input_schema();
        assert!(schema.get("required").is_none());
    }

    #[test]
    #[should_panic(expected = "tool name must not be empty")]
    fn empty_name_panics() {
        Tool::new("   ");
    }
}
