//! JSON schemas for structured model output.
//!
//! Schemas are generated from Rust types with `schemars` and tightened for
//! strict structured-output mode: every object gets
//! `additionalProperties: false`, every property is listed as required, and
//! `$ref`s are inlined.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::traits::ai::GenerationProvider;

/// A named JSON schema ready to send to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    /// Schema name (providers require one)
    pub name: String,

    /// Strict-mode JSON schema
    pub schema: Value,
}

impl StructuredSchema {
    /// Build the strict schema for `T`.
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_default();

        let definitions = match &mut schema {
            Value::Object(map) => {
                map.remove("$schema");
                map.remove("definitions")
            }
            _ => None,
        };
        if let Some(Value::Object(defs)) = definitions {
            inline_refs(&mut schema, &defs);
        }
        make_strict(&mut schema);

        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Run a structured completion and deserialize it into `T`.
pub async fn complete_as<T: JsonSchema + DeserializeOwned>(
    provider: &dyn GenerationProvider,
    schema: &StructuredSchema,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<T> {
    let value = provider
        .complete_structured(system_prompt, user_prompt, schema)
        .await?;
    Ok(serde_json::from_value(value)?)
}

fn make_strict(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".into(), Value::Bool(false));
                let required: Vec<Value> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect())
                    .unwrap_or_default();
                map.insert("required".into(), Value::Array(required));
            }
            for (_, child) in map.iter_mut() {
                make_strict(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(make_strict),
        _ => {}
    }
}

fn inline_refs(value: &mut Value, definitions: &Map<String, Value>) {
    let target = value
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix("#/definitions/"))
        .and_then(|name| definitions.get(name))
        .cloned();

    if let Some(mut resolved) = target {
        inline_refs(&mut resolved, definitions);
        *value = resolved;
        return;
    }

    match value {
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                inline_refs(child, definitions);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| inline_refs(v, definitions)),
        _ => {}
    }
}
