use serde_json::Value;
use thiserror::Error;

use crate::partial_json::{child_pointer, parse_partial, PartialDocument};
use crate::schema::ResultSchema;
use crate::validate::{validate, Mode, Validation, Violation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed structured output: {0}")]
    Malformed(String),

    #[error("structured output failed validation: {}", join_violations(.0))]
    Invalid(Vec<Violation>),

    /// A newer view dropped or changed a value that had already been emitted.
    #[error("structured output regressed at {path}")]
    Regression { path: String },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStep {
    /// Nothing to show yet.
    Pending,
    /// Valid, but identical to the last emitted view.
    Unchanged,
    /// A new view that replaces the previous one.
    Emit(Value),
}

/// Turns successive prefixes of a `final_result` payload into validated views.
///
/// Each call to [`feed`](Self::feed) takes the whole text received so far, not
/// a delta. Non-final fragments are parsed tolerantly and validated in
/// partial mode; the final fragment must be complete JSON and pass strict
/// validation.
#[derive(Debug, Clone)]
pub struct IncrementalDecoder {
    schema: ResultSchema,
    last: Option<Value>,
    fragments: usize,
    finished: bool,
}

impl IncrementalDecoder {
    pub fn new(schema: ResultSchema) -> Self {
        Self {
            schema,
            last: None,
            fragments: 0,
            finished: false,
        }
    }

    /// Last view handed out by [`feed`](Self::feed).
    pub fn last_view(&self) -> Option<&Value> {
        self.last.as_ref()
    }

    pub fn fragments_seen(&self) -> usize {
        self.fragments
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, fragment: &str, is_final: bool) -> Result<DecodeStep, DecodeError> {
        self.fragments += 1;

        if is_final {
            return self.finish(fragment);
        }

        let doc = parse_partial(fragment).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match validate(&self.schema, &doc, Mode::Partial) {
            Validation::Pending => Ok(DecodeStep::Pending),
            Validation::Invalid(violations) => Err(DecodeError::Invalid(violations)),
            Validation::Partial | Validation::Complete => {
                let view = self.view(&doc);
                if self.last.as_ref() == Some(&view) {
                    return Ok(DecodeStep::Unchanged);
                }
                self.accept(view)
            }
        }
    }

    fn finish(&mut self, fragment: &str) -> Result<DecodeStep, DecodeError> {
        let value: Value =
            serde_json::from_str(fragment).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let doc = PartialDocument::complete(value);

        if let Validation::Invalid(violations) = validate(&self.schema, &doc, Mode::Strict) {
            return Err(DecodeError::Invalid(violations));
        }

        let view = self.view(&doc);
        let step = self.accept(view)?;
        self.finished = true;
        log::debug!(
            "structured output complete after {} fragments",
            self.fragments
        );
        Ok(step)
    }

    fn view(&self, doc: &PartialDocument) -> Value {
        doc.value
            .as_ref()
            .map(|value| self.schema.view_of(value))
            .unwrap_or(Value::Null)
    }

    fn accept(&mut self, view: Value) -> Result<DecodeStep, DecodeError> {
        if let Some(previous) = &self.last {
            refines(previous, &view, "")?;
        }
        self.last = Some(view.clone());
        Ok(DecodeStep::Emit(view))
    }
}

/// Checks that `next` keeps every value already shown in `previous`: strings
/// may only grow at the end, lists only gain items, objects only gain keys.
pub fn refines(previous: &Value, next: &Value, pointer: &str) -> Result<(), DecodeError> {
    let regressed = || DecodeError::Regression {
        path: if pointer.is_empty() {
            "/".to_string()
        } else {
            pointer.to_string()
        },
    };

    match (previous, next) {
        (Value::String(before), Value::String(after)) => {
            if after.starts_with(before.as_str()) {
                Ok(())
            } else {
                Err(regressed())
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            if after.len() < before.len() {
                return Err(regressed());
            }
            for (index, (old, new)) in before.iter().zip(after).enumerate() {
                refines(old, new, &child_pointer(pointer, &index.to_string()))?;
            }
            Ok(())
        }
        (Value::Object(before), Value::Object(after)) => {
            for (key, old) in before {
                let new = after.get(key).ok_or_else(|| DecodeError::Regression {
                    path: child_pointer(pointer, key),
                })?;
                refines(old, new, &child_pointer(pointer, key))?;
            }
            Ok(())
        }
        (before, after) if before == after => Ok(()),
        _ => Err(regressed()),
    }
}
