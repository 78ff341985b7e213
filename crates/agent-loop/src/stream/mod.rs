pub mod handler;
pub mod structured;

pub use handler::{consume_llm_stream, StreamHandlingOutput};
pub use structured::{structured_fragments, StructuredChunk};
