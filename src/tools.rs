//! # Tool registry
//!
//! The orchestrator never knows what a tool does. It resolves calls by name
//! through the [`ToolRegistry`] trait, which takes a JSON object of arguments
//! and yields either a JSON object result or a [`ToolError`].
//!
//! [`Tools`] is the in-process implementation: a name-keyed set of [`Tool`]s,
//! each an async closure plus the metadata the prompt builder needs to
//! describe it to the model.
//!
//! ## Schema notation
//!
//! Parameter schemas may be written in any of three shapes and are normalised
//! to JSON Schema:
//!
//! - **Simple notation**: `{"date": "string", "limit": "integer"}` (all required)
//! - **Extended properties**: `{"limit": {"type": "integer", "optional": true}}`
//! - **Full JSON Schema**: anything with `"type"` and `"properties"`, passed through
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentloop::{tool, JsonObjectExt, Tools};
//! use serde_json::json;
//!
//! # fn main() -> agentloop::Result<()> {
//! let mut tools = Tools::new();
//! tools.register(
//!     tool("calendar_read", "List events on a given day")
//!         .param("date", "string")
//!         .build(|args| async move {
//!             let date = args.str_field("date")?;
//!             Ok(json!({"date": date, "events": []}))
//!         }),
//! )?;
//! # Ok(())
//! # }
//! ```

use crate::error::ToolError;
use crate::json::{self, JsonObject};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Outcome of one tool invocation
pub type ToolExecutionResult = std::result::Result<JsonObject, ToolError>;

/// Type-erased async tool body.
///
/// Handlers receive the call's argument object and may return any JSON
/// value; non-object values are wrapped by the registry.
pub type ToolHandler =
    Arc<dyn Fn(JsonObject) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// What the model is told about a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object
    pub parameters: Value,
}

/// Resolves and runs tools by name
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Execute `name` with `arguments`.
    ///
    /// Implementations must not panic on unknown names; they return
    /// [`ToolError::UnknownTool`] instead.
    async fn execute(&self, name: &str, arguments: JsonObject) -> ToolExecutionResult;

    /// Descriptors of every available tool, for the system prompt.
    fn descriptors(&self) -> Vec<ToolDescriptor>;
}

/// A named async tool with its parameter schema
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    /// Normalised JSON Schema
    input_schema: Value,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool. `input_schema` may use any supported notation.
    ///
    /// ```rust
    /// use agentloop::{JsonObjectExt, Tool};
    /// use serde_json::json;
    ///
    /// let add = Tool::new(
    ///     "add",
    ///     "Add two numbers",
    ///     json!({"a": "number", "b": "number"}),
    ///     |args| async move {
    ///         Ok(json!(args.f64_field("a")? + args.f64_field("b")?))
    ///     },
    /// );
    /// assert_eq!(add.input_schema()["required"], json!(["a", "b"]));
    /// ```
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: normalize_schema(input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Run the handler directly, bypassing result normalisation.
    pub async fn execute(&self, arguments: JsonObject) -> Result<Value> {
        (self.handler)(arguments).await
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Normalise a parameter schema to JSON Schema.
///
/// Per-property `"optional": true` or `"required": false` drop a parameter
/// from `required`; so does a `"default"` unless `"required": true` is set.
/// Non-object input yields an empty object schema.
fn normalize_schema(schema: Value) -> Value {
    let Value::Object(obj) = schema else {
        return serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        });
    };

    if obj.contains_key("type") && obj.contains_key("properties") {
        return Value::Object(obj);
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        match param_type {
            Value::String(type_str) => {
                properties.insert(param_name.clone(), type_schema(&type_str));
                required.push(param_name);
            }
            Value::Object(mut prop) => {
                let is_optional = prop
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop.remove("required").and_then(|v| v.as_bool());
                let has_default = prop.contains_key("default");

                properties.insert(param_name.clone(), Value::Object(prop));

                match is_required {
                    Some(true) => required.push(param_name),
                    Some(false) => {}
                    None if is_optional || has_default => {}
                    None => required.push(param_name),
                }
            }
            other => {
                log::debug!(
                    "ignoring parameter '{}' with unsupported schema ({})",
                    param_name,
                    json::type_name(&other)
                );
            }
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// JSON Schema fragment for a simple type name. Unknown names map to string.
fn type_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };
    serde_json::json!({ "type": json_type })
}

/// Incremental builder returned by [`tool`]
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({}),
        }
    }

    /// Replace the whole schema.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add a required parameter in simple notation.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = serde_json::json!({});
        }
        let obj = self
            .schema
            .as_object_mut()
            .expect("BUG: schema should be an object after initialization");
        obj.insert(name.to_string(), Value::String(type_str.to_string()));
        self
    }

    /// Add an optional parameter with a description.
    pub fn optional_param(mut self, name: &str, type_str: &str, description: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = serde_json::json!({});
        }
        let obj = self
            .schema
            .as_object_mut()
            .expect("BUG: schema should be an object after initialization");
        let mut prop = type_schema(type_str);
        if let Some(prop) = prop.as_object_mut() {
            prop.insert("description".into(), Value::String(description.to_string()));
            prop.insert("optional".into(), Value::Bool(true));
        }
        obj.insert(name.to_string(), prop);
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }
}

/// Start building a tool.
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// Name-keyed tool set, in registration order
#[derive(Debug, Clone, Default)]
pub struct Tools {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl Tools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if self.index.contains_key(tool.name()) {
            return Err(Error::config(format!(
                "tool '{}' is already registered",
                tool.name()
            )));
        }
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Tool) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(Tool::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolRegistry for Tools {
    async fn execute(&self, name: &str, arguments: JsonObject) -> ToolExecutionResult {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        log::debug!("executing tool '{}'", name);
        match tool.execute(arguments).await {
            Ok(value) => Ok(json::into_object(value)),
            Err(e) => {
                log::debug!("tool '{}' failed: {}", name, e);
                Err(ToolError::failed(name, e.to_string()))
            }
        }
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(Tool::descriptor).collect()
    }
}
