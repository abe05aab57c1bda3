use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ToolError;

static TOOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("tool name pattern is valid"));

/// Returns whether `name` is usable as a tool name in the function-calling protocol.
pub fn is_valid_tool_name(name: &str) -> bool {
    TOOL_NAME.is_match(name)
}

/// The schema contract of a tool: everything the model sees about it.
///
/// Only built through [`ToolDescriptor::new`] or a manifest, so it is always validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's input parameters
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    /// Builds a descriptor, checking the name, description and schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Result<Self, ToolError> {
        let name = name.into();
        let parameters = ParameterSchema::from_value(parameters)
            .map_err(|reason| ToolError::schema(&name, reason))?;
        let descriptor = Self {
            name,
            description: description.into(),
            parameters,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Checks the name and description rules.
    ///
    /// The parameter schema is validated when it is constructed, so a
    /// `ParameterSchema` value is always well-formed.
    pub fn validate(&self) -> Result<(), ToolError> {
        if !is_valid_tool_name(&self.name) {
            return Err(ToolError::schema(
                &self.name,
                format!("'{}' is not a valid tool name", self.name),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ToolError::schema(&self.name, "description must not be empty"));
        }
        Ok(())
    }

    /// Renders the descriptor in the chat-completion function-calling format.
    pub fn to_function_spec(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.as_value(),
            }
        })
    }
}

/// Primitive JSON types a parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl ParamType {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "null" => Self::Null,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    /// Returns whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
}

/// A validated `{ "type": "object", "properties": ..., "required": [...] }` schema.
///
/// The original JSON is kept verbatim for advertisement to the model, while the
/// parsed parameter list drives argument binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ParameterSchema {
    raw: Value,
    params: Vec<ParameterSpec>,
    required: Vec<String>,
}

impl ParameterSchema {
    /// Parses and validates a parameter schema.
    pub fn from_value(raw: Value) -> Result<Self, String> {
        let obj = raw
            .as_object()
            .ok_or_else(|| "parameters must be a JSON object".to_string())?;

        match obj.get("type").and_then(Value::as_str) {
            Some("object") => {}
            Some(other) => return Err(format!("parameters type must be \"object\", got \"{}\"", other)),
            None => return Err("parameters must declare \"type\": \"object\"".to_string()),
        }

        let empty = Map::new();
        let properties = match obj.get("properties") {
            None => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err("properties must be an object".to_string()),
        };

        let mut params = Vec::with_capacity(properties.len());
        for (name, prop) in properties {
            let kind = prop
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("property '{}' has no type", name))?;
            let kind = ParamType::parse(kind)
                .ok_or_else(|| format!("property '{}' has unsupported type '{}'", name, kind))?;
            let description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            params.push(ParameterSpec {
                name: name.clone(),
                kind,
                description,
            });
        }

        let required = match obj.get("required") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "required must list parameter names".to_string())
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err("required must be an array".to_string()),
        };

        if let Some(missing) = required.iter().find(|r| !properties.contains_key(r.as_str())) {
            return Err(format!("required parameter '{}' is not declared in properties", missing));
        }

        Ok(Self {
            raw,
            params,
            required,
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Binds raw call arguments onto the declared parameters.
    ///
    /// Accepts a named mapping or a positional array and always yields a
    /// mapping keyed by parameter name.
    pub fn bind(&self, raw: Value) -> Result<Map<String, Value>, String> {
        let bound = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => {
                if let Some(unknown) = map.keys().find(|k| self.param(k).is_none()) {
                    return Err(format!("unknown parameter '{}'", unknown));
                }
                map
            }
            Value::Array(values) => {
                if values.len() > self.params.len() {
                    return Err(format!(
                        "expected at most {} arguments, got {}",
                        self.params.len(),
                        values.len()
                    ));
                }
                self.params
                    .iter()
                    .zip(values)
                    .map(|(spec, value)| (spec.name.clone(), value))
                    .collect()
            }
            other => {
                return Err(format!(
                    "arguments must be a JSON object or array, got {}",
                    json_type_name(&other)
                ));
            }
        };

        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|r| !bound.contains_key(r.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing required parameter(s): {}", missing.join(", ")));
        }

        for (name, value) in &bound {
            if let Some(spec) = self.param(name) {
                if !spec.kind.matches(value) {
                    return Err(format!(
                        "parameter '{}' expects {}, got {}",
                        name,
                        spec.kind.as_str(),
                        json_type_name(value)
                    ));
                }
            }
        }

        Ok(bound)
    }
}

impl TryFrom<Value> for ParameterSchema {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<ParameterSchema> for Value {
    fn from(schema: ParameterSchema) -> Self {
        schema.raw
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn multiply_schema() -> ParameterSchema {
        ParameterSchema::from_value(json!({
            "type": "object",
            "properties": {
                "num1": { "type": "number", "description": "First number" },
                "num2": { "type": "number", "description": "Second number" }
            },
            "required": ["num1", "num2"]
        }))
        .unwrap()
    }

    #[test]
    fn tool_names_follow_identifier_rule() {
        assert!(is_valid_tool_name("multiplyNumbers"));
        assert!(is_valid_tool_name("_private2"));
        assert!(!is_valid_tool_name("2fast"));
        assert!(!is_valid_tool_name("../escape"));
        assert!(!is_valid_tool_name(""));
    }

    #[test]
    fn required_must_be_declared() {
        let err = ParameterSchema::from_value(json!({
            "type": "object",
            "properties": { "a": { "type": "string" } },
            "required": ["a", "b"]
        }))
        .unwrap_err();
        assert!(err.contains("'b'"));
    }

    #[test]
    fn properties_need_a_known_type() {
        assert!(ParameterSchema::from_value(json!({
            "type": "object",
            "properties": { "a": { "description": "untyped" } }
        }))
        .is_err());
        assert!(ParameterSchema::from_value(json!({
            "type": "object",
            "properties": { "a": { "type": "decimal" } }
        }))
        .is_err());
    }

    #[test]
    fn declaration_order_is_preserved() {
        let schema = multiply_schema();
        let names: Vec<_> = schema.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["num1", "num2"]);
    }

    #[test]
    fn descriptor_rejects_empty_description() {
        let err = ToolDescriptor::new("noop", "  ", json!({ "type": "object" })).unwrap_err();
        assert!(matches!(err, ToolError::SchemaValidation { .. }));
    }

    #[test]
    fn bind_named_arguments() {
        let bound = multiply_schema().bind(json!({ "num1": 5, "num2": 3 })).unwrap();
        assert_eq!(bound["num1"], json!(5));
        assert_eq!(bound["num2"], json!(3));
    }

    #[test]
    fn bind_positional_arguments() {
        let bound = multiply_schema().bind(json!([5, 3])).unwrap();
        assert_eq!(bound["num1"], json!(5));
        assert_eq!(bound["num2"], json!(3));
    }

    #[test]
    fn bind_rejects_arity_mismatch() {
        let schema = multiply_schema();
        assert!(schema.bind(json!([5])).unwrap_err().contains("num2"));
        assert!(schema.bind(json!([1, 2, 3])).is_err());
        assert!(schema.bind(json!({ "num1": 5 })).is_err());
        assert!(schema.bind(json!({ "num1": 5, "num2": 3, "num3": 1 })).is_err());
    }

    #[test]
    fn bind_rejects_type_mismatch() {
        let err = multiply_schema()
            .bind(json!({ "num1": "five", "num2": 3 }))
            .unwrap_err();
        assert!(err.contains("expects number"));
    }

    #[test]
    fn bind_treats_null_as_no_arguments() {
        let optional = ParameterSchema::from_value(json!({
            "type": "object",
            "properties": { "verbose": { "type": "boolean" } }
        }))
        .unwrap();
        assert!(optional.bind(Value::Null).unwrap().is_empty());

        let err = multiply_schema().bind(Value::Null).unwrap_err();
        assert!(err.contains("num1, num2"));
    }

    #[test]
    fn bind_rejects_scalar_payloads() {
        assert!(multiply_schema().bind(json!("{not json")).is_err());
    }

    #[test]
    fn schema_serializes_verbatim() {
        let raw = json!({ "type": "object", "properties": {}, "required": [] });
        let schema = ParameterSchema::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&schema).unwrap(), raw);
    }
}
