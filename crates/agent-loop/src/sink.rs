use serde_json::Value;

/// Receives the latest validated view of a streamed structured result.
///
/// Each call replaces whatever was rendered before; `is_final` is set once,
/// on the fully validated result.
pub trait PresentationSink: Send {
    fn render(&mut self, view: &Value, is_final: bool);
}

impl<F> PresentationSink for F
where
    F: FnMut(&Value, bool) + Send,
{
    fn render(&mut self, view: &Value, is_final: bool) {
        self(view, is_final)
    }
}

/// Discards every view.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn render(&mut self, _view: &Value, _is_final: bool) {}
}
