use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolCall;

/// One streamed fragment of a tool call.
///
/// Providers send the id and name once, usually on the first fragment for an
/// index, and the arguments as a run of string pieces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }
    }

    pub fn arguments(index: usize, piece: impl Into<String>) -> Self {
        Self {
            index,
            arguments: Some(piece.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

/// Merges streamed [`ToolCallDelta`]s into complete calls, keyed by index so
/// interleaved calls never mix their argument text.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    parts: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, delta: &ToolCallDelta) {
        let part = self.parts.entry(delta.index).or_default();

        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            part.id = Some(id.to_string());
        }
        if let Some(name) = delta.name.as_deref().filter(|name| !name.is_empty()) {
            part.name = Some(name.to_string());
        }
        if let Some(piece) = &delta.arguments {
            part.arguments.push_str(piece);
        }
    }

    pub fn extend<'a, I>(&mut self, deltas: I)
    where
        I: IntoIterator<Item = &'a ToolCallDelta>,
    {
        for delta in deltas {
            self.update(delta);
        }
    }

    /// Argument text received so far for the first call named `name`.
    pub fn arguments_of(&self, name: &str) -> Option<&str> {
        self.parts
            .values()
            .find(|part| part.name.as_deref() == Some(name))
            .map(|part| part.arguments.as_str())
    }

    pub fn parts(&self) -> impl Iterator<Item = &PartialToolCall> {
        self.parts.values()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Completed calls in index order. Fragments that never received a name
    /// are dropped; a missing id is generated.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.parts
            .into_values()
            .filter_map(|part| {
                let name = part.name.filter(|name| !name.trim().is_empty())?;
                let id = part
                    .id
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                Some(ToolCall::function(id, name, part.arguments))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_merges_argument_pieces() {
        let mut accumulator = ToolCallAccumulator::new();

        accumulator.update(&ToolCallDelta::start(0, "call_1", "get_lat_lon"));
        accumulator.update(&ToolCallDelta::arguments(0, "{\"city_name\": \""));
        accumulator.update(&ToolCallDelta::arguments(0, "Kobe"));
        accumulator.update(&ToolCallDelta::arguments(0, "\"}"));

        let calls = accumulator.finalize();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "get_lat_lon");
        assert_eq!(calls[0].function.arguments, "{\"city_name\": \"Kobe\"}");
    }

    #[test]
    fn interleaved_calls_keep_their_own_arguments_in_index_order() {
        let mut accumulator = ToolCallAccumulator::new();

        accumulator.extend(&[
            ToolCallDelta::start(1, "call_b", "get_weather_forecast"),
            ToolCallDelta::start(0, "call_a", "get_lat_lon"),
            ToolCallDelta::arguments(1, "{\"lat\":1,"),
            ToolCallDelta::arguments(0, "{\"city_name\":\"Kobe\"}"),
            ToolCallDelta::arguments(1, "\"lon\":2}"),
        ]);

        assert_eq!(
            accumulator.arguments_of("get_weather_forecast"),
            Some("{\"lat\":1,\"lon\":2}")
        );

        let calls = accumulator.finalize();
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].function.arguments, "{\"lat\":1,\"lon\":2}");
    }

    #[test]
    fn finalize_drops_nameless_calls_and_fills_missing_ids() {
        let mut accumulator = ToolCallAccumulator::new();

        accumulator.update(&ToolCallDelta::arguments(0, "{}"));
        accumulator.update(&ToolCallDelta {
            index: 1,
            id: None,
            name: Some("final_result".to_string()),
            arguments: Some("{}".to_string()),
        });

        let calls = accumulator.finalize();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "final_result");
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn arguments_of_unknown_name_is_none() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.update(&ToolCallDelta::start(0, "call_1", "get_lat_lon"));

        assert_eq!(accumulator.arguments_of("get_lat_lon"), Some(""));
        assert_eq!(accumulator.arguments_of("final_result"), None);
    }
}
