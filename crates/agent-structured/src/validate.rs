use std::fmt;

use serde_json::Value;

use crate::partial_json::{child_pointer, PartialDocument};
use crate::schema::{Constraints, FieldSpec, FieldType, ObjectSchema, ResultSchema, LIST_WRAPPER_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Required fields inside still-open objects may be absent.
    Partial,
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Missing,
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    Constraint(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// JSON pointer into the caller-facing view.
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.kind {
            ViolationKind::Missing => write!(f, "{path}: field required"),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{path}: expected {expected}, got {found}")
            }
            ViolationKind::Constraint(reason) => write!(f, "{path}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Everything required is present and valid.
    Complete,
    /// Valid so far; some required fields have not streamed in yet.
    Partial,
    /// Nothing worth showing yet.
    Pending,
    Invalid(Vec<Violation>),
}

struct Walk<'a> {
    doc: &'a PartialDocument,
    mode: Mode,
    violations: Vec<Violation>,
    gaps: usize,
    /// Prefix mapping document pointers to view pointers (the list wrapper).
    view_offset: usize,
}

/// Checks a parsed document against `schema`.
///
/// Pointers in the returned violations are relative to the caller-facing
/// view, so list results report `/2/length` rather than
/// `/response/2/length`.
pub fn validate(schema: &ResultSchema, doc: &PartialDocument, mode: Mode) -> Validation {
    let Some(root) = &doc.value else {
        return match mode {
            Mode::Partial => Validation::Pending,
            Mode::Strict => Validation::Invalid(vec![Violation {
                path: String::new(),
                kind: ViolationKind::Missing,
            }]),
        };
    };

    let mut walk = Walk {
        doc,
        mode,
        violations: Vec::new(),
        gaps: 0,
        view_offset: 0,
    };

    let has_content = match schema {
        ResultSchema::Object(item) => {
            walk.object(item, root, "");
            root.as_object().is_some_and(|map| !map.is_empty())
        }
        ResultSchema::List(item) => walk.wrapped_list(item, root),
    };

    if !walk.violations.is_empty() {
        return Validation::Invalid(walk.violations);
    }
    if mode == Mode::Partial && !has_content {
        return Validation::Pending;
    }
    if walk.gaps > 0 || (mode == Mode::Partial && !doc.complete) {
        return Validation::Partial;
    }
    Validation::Complete
}

impl Walk<'_> {
    fn report(&mut self, pointer: &str, kind: ViolationKind) {
        self.violations.push(Violation {
            path: pointer[self.view_offset..].to_string(),
            kind,
        });
    }

    fn still_streaming(&self, pointer: &str) -> bool {
        self.mode == Mode::Partial && self.doc.is_open(pointer)
    }

    /// Walks `{"response": [...]}`; returns whether any element has a field.
    fn wrapped_list(&mut self, item: &ObjectSchema, root: &Value) -> bool {
        let Some(map) = root.as_object() else {
            self.report("", mismatch("object", root));
            return false;
        };

        let list_pointer = child_pointer("", LIST_WRAPPER_KEY);
        self.view_offset = list_pointer.len();

        let Some(list) = map.get(LIST_WRAPPER_KEY) else {
            if self.still_streaming("") {
                self.gaps += 1;
            } else {
                self.report(&list_pointer, ViolationKind::Missing);
            }
            return false;
        };

        let Some(elements) = list.as_array() else {
            self.report(&list_pointer, mismatch("array", list));
            return false;
        };

        for (index, element) in elements.iter().enumerate() {
            self.object(item, element, &child_pointer(&list_pointer, &index.to_string()));
        }

        elements
            .iter()
            .any(|element| element.as_object().is_some_and(|map| !map.is_empty()))
    }

    fn object(&mut self, schema: &ObjectSchema, value: &Value, pointer: &str) {
        let Some(map) = value.as_object() else {
            self.report(pointer, mismatch("object", value));
            return;
        };

        for spec in schema.fields() {
            let child = child_pointer(pointer, &spec.name);
            match map.get(&spec.name) {
                Some(field_value) => self.field(spec, field_value, &child),
                None if !spec.required => {}
                None if self.still_streaming(pointer) => self.gaps += 1,
                None => self.report(&child, ViolationKind::Missing),
            }
        }
    }

    fn field(&mut self, spec: &FieldSpec, value: &Value, pointer: &str) {
        if self.value(&spec.ty, value, pointer) {
            self.constraints(&spec.constraints, value, pointer);
        }
    }

    /// Type check; returns false when the value has the wrong type.
    fn value(&mut self, ty: &FieldType, value: &Value, pointer: &str) -> bool {
        let ok = match ty {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::List(item) => match value.as_array() {
                Some(elements) => {
                    for (index, element) in elements.iter().enumerate() {
                        self.value(item, element, &child_pointer(pointer, &index.to_string()));
                    }
                    true
                }
                None => false,
            },
            FieldType::Object(schema) => {
                if value.is_object() {
                    self.object(schema, value, pointer);
                    true
                } else {
                    false
                }
            }
        };

        if !ok {
            self.report(pointer, mismatch(ty.json_type(), value));
        }
        ok
    }

    fn constraints(&mut self, constraints: &Constraints, value: &Value, pointer: &str) {
        if constraints.is_empty() {
            return;
        }

        if let Some(number) = value.as_f64() {
            let checks = [
                (constraints.ge, number >= constraints.ge.unwrap_or(f64::NEG_INFINITY), "greater than or equal to"),
                (constraints.gt, number > constraints.gt.unwrap_or(f64::NEG_INFINITY), "greater than"),
                (constraints.le, number <= constraints.le.unwrap_or(f64::INFINITY), "less than or equal to"),
                (constraints.lt, number < constraints.lt.unwrap_or(f64::INFINITY), "less than"),
            ];
            for (bound, satisfied, relation) in checks {
                if let (Some(bound), false) = (bound, satisfied) {
                    self.report(
                        pointer,
                        ViolationKind::Constraint(format!("input should be {relation} {bound}")),
                    );
                }
            }
            return;
        }

        let length = match value {
            Value::String(text) => text.chars().count(),
            Value::Array(items) => items.len(),
            _ => return,
        };

        // A value that is still growing can only get longer.
        let growing = self.mode == Mode::Partial
            && (self.doc.truncated_string.as_deref() == Some(pointer) || self.doc.is_open(pointer));

        if let Some(min) = constraints.min_length {
            if length < min && !growing {
                self.report(
                    pointer,
                    ViolationKind::Constraint(format!("should have at least {min} characters or items")),
                );
            }
        }
        if let Some(max) = constraints.max_length {
            if length > max {
                self.report(
                    pointer,
                    ViolationKind::Constraint(format!("should have at most {max} characters or items")),
                );
            }
        }
    }
}

fn mismatch(expected: &'static str, value: &Value) -> ViolationKind {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ViolationKind::TypeMismatch { expected, found }
}
