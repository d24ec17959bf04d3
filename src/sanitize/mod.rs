use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::BlueprintError;
use crate::wire::{CodeBundle, DesignConcept};

pub const DEFAULT_NAME: &str = "Generated Concept";
pub const DEFAULT_THEME: &str = "Modern";
pub const DEFAULT_DESCRIPTION: &str = "No description available.";
pub const DEFAULT_TYPOGRAPHY: &str = "Sans-serif";
pub const DEFAULT_LAYOUT_ANALYSIS: &str = "Layout analyzed.";
pub const DEFAULT_PREVIEW: &str = "<div class='p-4 text-red-500'>Preview Unavailable</div>";

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?").expect("static regex"))
}

/// Remove every ```json / ``` marker and trim. Models asked for raw JSON still
/// wrap it in fences often enough that every response goes through here.
pub fn strip_code_fences(text: &str) -> String {
    fence_re().replace_all(text, "").trim().to_string()
}

/// Fence-strip then parse. The error carries the text that failed to parse.
pub fn parse_json_response(text: &str) -> Result<Value> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(&cleaned).map_err(|e| {
        BlueprintError::Schema(format!(
            "model did not return valid JSON: {e}\n--- content start ---\n{cleaned}\n--- content end ---"
        ))
        .into()
    })
}

/// How a loosely typed text field arrived from the model.
enum Shape<'a> {
    Text(&'a str),
    WithPrimary(&'a Value),
    Other(&'a Value),
    Missing,
}

fn classify(v: Option<&Value>) -> Shape<'_> {
    match v {
        None | Some(Value::Null) => Shape::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => Shape::Missing,
        Some(Value::String(s)) => Shape::Text(s),
        Some(obj @ Value::Object(m)) => match m.get("primary") {
            Some(p) if !is_blank(p) => Shape::WithPrimary(p),
            _ => Shape::Other(obj),
        },
        Some(other) => Shape::Other(other),
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// string -> itself; object with `primary` -> that; anything else -> its JSON
/// dump; absent -> `default`.
fn coerce_text(v: Option<&Value>, default: &str) -> String {
    match classify(v) {
        Shape::Text(s) => s.to_string(),
        Shape::WithPrimary(p) => value_to_text(p),
        Shape::Other(o) => o.to_string(),
        Shape::Missing => default.to_string(),
    }
}

/// Plain text fields do not get the `primary` fallback.
fn coerce_plain(v: Option<&Value>, default: &str) -> String {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

fn coerce_palette(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items.iter().filter(|i| !i.is_null()).map(value_to_text).collect(),
        Some(Value::Object(m)) => m.values().filter(|i| !i.is_null()).map(value_to_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn coerce_id(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => Uuid::new_v4().simple().to_string(),
    }
}

/// Coerce one decoded model object into a concept. Never fails: every field
/// ends up populated with something, even if the input was not an object.
pub fn sanitize_concept(c: &Value) -> DesignConcept {
    let get = |k: &str| c.get(k);
    DesignConcept {
        id: coerce_id(get("id")),
        name: coerce_plain(get("name"), DEFAULT_NAME),
        theme: coerce_text(get("theme"), DEFAULT_THEME),
        description: coerce_plain(get("description"), DEFAULT_DESCRIPTION),
        color_palette: coerce_palette(get("colorPalette")),
        typography: coerce_text(get("typography"), DEFAULT_TYPOGRAPHY),
        layout_analysis: coerce_plain(get("layoutAnalysis"), DEFAULT_LAYOUT_ANALYSIS),
        html_preview: coerce_plain(get("htmlPreview"), DEFAULT_PREVIEW),
    }
}

/// Arrays map element-wise; anything else, a lone object included, yields no
/// concepts.
pub fn sanitize_concepts(v: &Value) -> Vec<DesignConcept> {
    match v {
        Value::Array(items) => items.iter().map(sanitize_concept).collect(),
        _ => Vec::new(),
    }
}

/// The code call must produce an object; non-string file bodies are kept as
/// their JSON text rather than dropped.
pub fn sanitize_bundle(v: &Value) -> Result<CodeBundle> {
    let obj = v.as_object().ok_or_else(|| {
        BlueprintError::Schema(format!("expected a JSON object of file paths, got: {}", kind_of(v)))
    })?;
    Ok(obj
        .iter()
        .map(|(path, body)| (path.clone(), value_to_text(body)))
        .collect())
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
