//! Structured model output: schemas, tolerant parsing of streamed JSON,
//! partial validation and the incremental decoder that feeds a live view.

pub mod debounce;
pub mod decoder;
pub mod partial_json;
pub mod schema;
pub mod validate;

pub use debounce::debounce;
pub use decoder::{refines, DecodeError, DecodeStep, IncrementalDecoder};
pub use partial_json::{parse_partial, PartialDocument, PartialJsonError};
pub use schema::{
    Constraints, FieldSpec, FieldType, ObjectSchema, ResultSchema, SchemaError, FINAL_RESULT_TOOL,
    LIST_WRAPPER_KEY,
};
pub use validate::{validate, Mode, Validation, Violation, ViolationKind};
