//! Declared parameter contracts for tools.
//!
//! A [`ParameterSchema`] is an ordered list of named, typed parameters. The
//! invoker checks model-supplied arguments against it before a tool runs, so a
//! tool body only ever sees arguments that match its declaration.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::tools::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    /// Any JSON number, integers included.
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    /// JSON Schema sent to the model with the tool signature.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            let mut property = json!({ "type": spec.kind.as_json_type() });
            if let Some(description) = &spec.description {
                property["description"] = json!(description);
            }
            properties.insert(spec.name.clone(), property);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Checks `args` against the declaration. Any mismatch is a contract
    /// violation reported as [`ToolError::InvalidArguments`].
    pub fn validate(&self, args: &Value) -> Result<ToolArgs, ToolError> {
        let Some(object) = args.as_object() else {
            return Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {}",
                json_kind(args)
            )));
        };

        let mut problems = Vec::new();

        for spec in &self.params {
            match object.get(&spec.name) {
                None if spec.required => {
                    problems.push(format!("missing required parameter '{}'", spec.name));
                }
                None => {}
                Some(value) if !spec.kind.accepts(value) => {
                    problems.push(format!(
                        "parameter '{}' must be {}, got {}",
                        spec.name,
                        spec.kind.as_json_type(),
                        json_kind(value)
                    ));
                }
                Some(_) => {}
            }
        }

        for key in object.keys() {
            if !self.params.iter().any(|spec| &spec.name == key) {
                problems.push(format!("unexpected parameter '{key}'"));
            }
        }

        if problems.is_empty() {
            Ok(ToolArgs(object.clone()))
        } else {
            Err(ToolError::InvalidArguments(problems.join("; ")))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Arguments that already passed [`ParameterSchema::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Deserializes the arguments into the tool's own argument struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates() -> ParameterSchema {
        ParameterSchema::new()
            .param(ParameterSpec::required("lat", ParamKind::Number).describe("Latitude"))
            .param(ParameterSpec::required("lon", ParamKind::Number))
            .param(ParameterSpec::optional("units", ParamKind::String))
    }

    #[test]
    fn accepts_matching_arguments() {
        let args = coordinates()
            .validate(&json!({"lat": 34.69, "lon": 135}))
            .expect("valid args");

        assert_eq!(args.get("lon"), Some(&json!(135)));
        assert!(args.get("units").is_none());
    }

    #[test]
    fn reports_every_problem() {
        let error = coordinates()
            .validate(&json!({"lat": "north", "extra": true}))
            .unwrap_err();

        let ToolError::InvalidArguments(message) = error else {
            panic!("expected InvalidArguments");
        };
        assert!(message.contains("parameter 'lat' must be number, got string"));
        assert!(message.contains("missing required parameter 'lon'"));
        assert!(message.contains("unexpected parameter 'extra'"));
    }

    #[test]
    fn rejects_non_object_arguments() {
        let error = coordinates().validate(&json!([1, 2])).unwrap_err();
        assert!(matches!(error, ToolError::InvalidArguments(message) if message.contains("array")));
    }

    #[test]
    fn integer_kind_rejects_fractions() {
        let schema = ParameterSchema::new().param(ParameterSpec::required("days", ParamKind::Integer));

        assert!(schema.validate(&json!({"days": 3})).is_ok());
        assert!(schema.validate(&json!({"days": 3.5})).is_err());
    }

    #[test]
    fn json_schema_lists_required_parameters_in_declaration_order() {
        let schema = coordinates().to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["lat"]["type"], "number");
        assert_eq!(schema["properties"]["lat"]["description"], "Latitude");
        assert_eq!(schema["required"], json!(["lat", "lon"]));
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn parse_into_typed_arguments() {
        #[derive(serde::Deserialize)]
        struct Coordinates {
            lat: f64,
            lon: f64,
        }

        let args = coordinates()
            .validate(&json!({"lat": 1.5, "lon": -2}))
            .unwrap();
        let parsed: Coordinates = args.parse().unwrap();

        assert_eq!(parsed.lat, 1.5);
        assert_eq!(parsed.lon, -2.0);
    }
}
