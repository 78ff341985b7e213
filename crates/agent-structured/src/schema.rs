//! Declarative shapes for structured model output.
//!
//! A [`ResultSchema`] is either a single object or a list of objects. The
//! model fills it by calling the `final_result` tool; list results travel
//! wrapped in an object under [`LIST_WRAPPER_KEY`], since tool arguments must
//! be a JSON object.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Name of the tool the model calls to deliver its structured answer.
pub const FINAL_RESULT_TOOL: &str = "final_result";

/// Key under which list results are wrapped in the tool arguments.
pub const LIST_WRAPPER_KEY: &str = "response";

const FINAL_RESULT_DESCRIPTION: &str = "The final response which ends this conversation";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("field name cannot be empty")]
    EmptyFieldName,

    #[error("field '{0}' declared more than once")]
    DuplicateField(String),

    #[error("field '{field}': {reason}")]
    InvalidConstraint { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    List(Box<FieldType>),
    Object(ObjectSchema),
}

impl FieldType {
    pub fn list_of(item: FieldType) -> Self {
        FieldType::List(Box::new(item))
    }

    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::List(_) => "array",
            FieldType::Object(_) => "object",
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            FieldType::List(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            FieldType::Object(schema) => schema.to_json_schema(),
            scalar => json!({ "type": scalar.json_type() }),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Integer)
    }

    fn has_length(&self) -> bool {
        matches!(self, FieldType::String | FieldType::List(_))
    }
}

/// Bounds checked on present values. Numeric bounds apply to numbers,
/// length bounds to strings (in characters) and lists (in items).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub ge: Option<f64>,
    pub gt: Option<f64>,
    pub le: Option<f64>,
    pub lt: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }

    fn write_json_schema(&self, property: &mut Map<String, Value>, ty: &FieldType) {
        let bounds = [
            ("minimum", self.ge),
            ("exclusiveMinimum", self.gt),
            ("maximum", self.le),
            ("exclusiveMaximum", self.lt),
        ];
        for (key, bound) in bounds {
            if let Some(bound) = bound {
                property.insert(key.to_string(), json!(bound));
            }
        }

        let (min_key, max_key) = match ty {
            FieldType::List(_) => ("minItems", "maxItems"),
            _ => ("minLength", "maxLength"),
        };
        if let Some(min) = self.min_length {
            property.insert(min_key.to_string(), json!(min));
        }
        if let Some(max) = self.max_length {
            property.insert(max_key.to_string(), json!(max));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub description: Option<String>,
    pub constraints: Constraints,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
            constraints: Constraints::default(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn ge(mut self, bound: f64) -> Self {
        self.constraints.ge = Some(bound);
        self
    }

    pub fn gt(mut self, bound: f64) -> Self {
        self.constraints.gt = Some(bound);
        self
    }

    pub fn le(mut self, bound: f64) -> Self {
        self.constraints.le = Some(bound);
        self
    }

    pub fn lt(mut self, bound: f64) -> Self {
        self.constraints.lt = Some(bound);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }

    fn check(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }

        let invalid = |reason: &str| SchemaError::InvalidConstraint {
            field: self.name.clone(),
            reason: reason.to_string(),
        };
        let c = &self.constraints;

        let has_numeric = c.ge.is_some() || c.gt.is_some() || c.le.is_some() || c.lt.is_some();
        if has_numeric && !self.ty.is_numeric() {
            return Err(invalid("numeric bounds on a non-numeric field"));
        }
        if (c.min_length.is_some() || c.max_length.is_some()) && !self.ty.has_length() {
            return Err(invalid("length bounds on a field without length"));
        }

        let lower = c.ge.into_iter().chain(c.gt).fold(f64::NEG_INFINITY, f64::max);
        let upper = c.le.into_iter().chain(c.lt).fold(f64::INFINITY, f64::min);
        if lower > upper {
            return Err(invalid("lower bound exceeds upper bound"));
        }
        if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
            if min > max {
                return Err(invalid("min_length exceeds max_length"));
            }
        }

        match &self.ty {
            FieldType::Object(schema) => schema.check(),
            FieldType::List(item) => match item.as_ref() {
                FieldType::Object(schema) => schema.check(),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: Vec<FieldSpec>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Rejects declarations no value could ever satisfy.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for spec in &self.fields {
            spec.check()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateField(spec.name.clone()));
            }
        }
        Ok(())
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.fields {
            let mut property = match spec.ty.to_json_schema() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            if let Some(description) = &spec.description {
                property.insert("description".to_string(), json!(description));
            }
            spec.constraints.write_json_schema(&mut property, &spec.ty);
            properties.insert(spec.name.clone(), Value::Object(property));
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultSchema {
    Object(ObjectSchema),
    List(ObjectSchema),
}

impl ResultSchema {
    pub fn item(&self) -> &ObjectSchema {
        match self {
            ResultSchema::Object(schema) | ResultSchema::List(schema) => schema,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ResultSchema::List(_))
    }

    pub fn check(&self) -> Result<(), SchemaError> {
        self.item().check()
    }

    pub fn tool_name(&self) -> &'static str {
        FINAL_RESULT_TOOL
    }

    pub fn tool_description(&self) -> &'static str {
        FINAL_RESULT_DESCRIPTION
    }

    /// Parameters of the `final_result` tool.
    pub fn tool_parameters(&self) -> Value {
        match self {
            ResultSchema::Object(schema) => schema.to_json_schema(),
            ResultSchema::List(schema) => {
                let mut properties = Map::new();
                properties.insert(
                    LIST_WRAPPER_KEY.to_string(),
                    json!({ "type": "array", "items": schema.to_json_schema() }),
                );
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": [LIST_WRAPPER_KEY],
                })
            }
        }
    }

    /// The caller-facing value inside the tool arguments: the object itself,
    /// or the wrapped list.
    pub fn view_of(&self, arguments: &Value) -> Value {
        match self {
            ResultSchema::Object(_) => arguments.clone(),
            ResultSchema::List(_) => arguments
                .get(LIST_WRAPPER_KEY)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whale() -> ObjectSchema {
        ObjectSchema::new()
            .field(FieldSpec::required("name", FieldType::String))
            .field(FieldSpec::required("length", FieldType::Number).describe("Average length of an adult whale in meters."))
            .field(FieldSpec::optional("weight", FieldType::Number).ge(50.0))
            .field(FieldSpec::optional("ocean", FieldType::String))
            .field(FieldSpec::optional("description", FieldType::String))
    }

    #[test]
    fn list_schema_wraps_items_under_response() {
        let params = ResultSchema::List(whale()).tool_parameters();

        assert_eq!(params["required"], json!(["response"]));
        let items = &params["properties"]["response"]["items"];
        assert_eq!(items["required"], json!(["name", "length"]));
        assert_eq!(items["properties"]["weight"]["minimum"], json!(50.0));
        assert_eq!(
            items["properties"]["length"]["description"],
            "Average length of an adult whale in meters."
        );
    }

    #[test]
    fn object_schema_is_used_directly() {
        let schema = ObjectSchema::new()
            .field(FieldSpec::required("city", FieldType::String))
            .field(FieldSpec::required("country", FieldType::String));

        let params = ResultSchema::Object(schema).tool_parameters();

        assert_eq!(params["type"], "object");
        assert_eq!(params["properties"]["city"]["type"], "string");
    }

    #[test]
    fn view_of_unwraps_list_results() {
        let schema = ResultSchema::List(whale());
        let args = json!({"response": [{"name": "Blue whale", "length": 25.0}]});

        assert_eq!(schema.view_of(&args), json!([{"name": "Blue whale", "length": 25.0}]));
        assert_eq!(schema.view_of(&json!({})), json!([]));
    }

    #[test]
    fn check_rejects_impossible_declarations() {
        let duplicate = ObjectSchema::new()
            .field(FieldSpec::required("name", FieldType::String))
            .field(FieldSpec::optional("name", FieldType::String));
        assert_eq!(duplicate.check(), Err(SchemaError::DuplicateField("name".to_string())));

        let crossed = ObjectSchema::new().field(FieldSpec::required("weight", FieldType::Number).ge(10.0).lt(5.0));
        assert!(matches!(crossed.check(), Err(SchemaError::InvalidConstraint { .. })));

        let misplaced = ObjectSchema::new().field(FieldSpec::required("name", FieldType::String).ge(1.0));
        assert!(misplaced.check().is_err());

        assert!(whale().check().is_ok());
    }

    #[test]
    fn list_length_bounds_render_as_item_counts() {
        let schema = ObjectSchema::new().field(
            FieldSpec::required("tags", FieldType::list_of(FieldType::String)).max_length(3),
        );

        let json = schema.to_json_schema();
        assert_eq!(json["properties"]["tags"]["maxItems"], 3);
        assert_eq!(json["properties"]["tags"]["items"]["type"], "string");
    }
}
