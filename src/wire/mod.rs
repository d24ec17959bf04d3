use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// ========================================
/// Domain types shared by the pipeline, the wizard and the HTTP surface
/// ========================================

/// One AI-proposed design direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignConcept {
    pub id: String,
    pub name: String,
    pub theme: String,
    pub description: String,
    pub color_palette: Vec<String>,
    pub typography: String,
    pub layout_analysis: String,
    pub html_preview: String,
}

/// File path -> generated source. Ordered so listings and writes are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeBundle(pub BTreeMap<String, String>);

impl CodeBundle {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn files(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn total_bytes(&self) -> usize {
        self.0.values().map(|s| s.len()).sum()
    }
}

impl FromIterator<(String, String)> for CodeBundle {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Body of `POST /api/concepts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptsRequest {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub sketch_data: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Body of `POST /api/generate-code`. The concept is kept loose so that any
/// extra keys the client holds are forwarded to the model untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest {
    #[serde(default)]
    pub intent: String,
    pub concept: Value,
}

/// A decoded `data:<mime>;base64,<payload>` URL. The payload is kept encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: String,
}

impl DataUrl {
    /// Splits a data URL on its first comma. Anything without a comma is
    /// treated as an empty PNG payload rather than an error.
    pub fn parse(url: &str) -> Self {
        match url.split_once(',') {
            Some((header, data)) => {
                let mime_type = header
                    .strip_prefix("data:")
                    .and_then(|h| h.split(';').next())
                    .filter(|m| !m.is_empty())
                    .unwrap_or("image/png")
                    .to_string();
                Self { mime_type, data: data.to_string() }
            }
            None => Self { mime_type: "image/png".into(), data: String::new() },
        }
    }

    pub fn to_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// ========================================
/// Gemini generateContent wire protocol
/// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(t: impl Into<String>) -> Self {
        Self { text: Some(t.into()), inline_data: None }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<Modality>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// What a caller asks of a provider: one model, one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<Modality>>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, parts: Vec<Part>) -> Self {
        Self { model: model.into(), parts, response_mime_type: None, response_modalities: None }
    }

    pub fn json(mut self) -> Self {
        self.response_mime_type = Some("application/json".into());
        self
    }

    pub fn modalities(mut self, m: Vec<Modality>) -> Self {
        self.response_modalities = Some(m);
        self
    }

    pub fn to_wire(&self) -> GenerateContentRequest {
        let generation_config = if self.response_mime_type.is_some() || self.response_modalities.is_some() {
            Some(GenerationConfig {
                response_mime_type: self.response_mime_type.clone(),
                response_modalities: self.response_modalities.clone(),
            })
        } else {
            None
        };
        GenerateContentRequest {
            contents: vec![Content { role: Some("user".into()), parts: self.parts.clone() }],
            generation_config,
        }
    }
}

/// Concatenated text parts plus any inline images of the first candidate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationOutput {
    pub text: String,
    pub images: Vec<InlineData>,
}

impl From<GenerateContentResponse> for GenerationOutput {
    fn from(resp: GenerateContentResponse) -> Self {
        let mut out = GenerationOutput::default();
        let parts = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();
        for p in parts {
            if let Some(t) = p.text {
                out.text.push_str(&t);
            }
            if let Some(img) = p.inline_data {
                out.images.push(img);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_url_splits_mime_and_payload() {
        let d = DataUrl::parse("data:image/jpeg;base64,AAAA");
        assert_eq!(d.mime_type, "image/jpeg");
        assert_eq!(d.data, "AAAA");
        assert_eq!(d.to_url(), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn data_url_without_comma_is_empty_png() {
        let d = DataUrl::parse("");
        assert_eq!(d.mime_type, "image/png");
        assert!(d.data.is_empty());
    }

    #[test]
    fn request_serializes_in_gemini_shape() {
        let req = GenerationRequest::new("m", vec![Part::text("hi"), Part::inline("image/png", "AA")]).json();
        let v = serde_json::to_value(req.to_wire()).unwrap();
        assert_eq!(
            v,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "hi" },
                        { "inlineData": { "mimeType": "image/png", "data": "AA" } }
                    ]
                }],
                "generationConfig": { "responseMimeType": "application/json" }
            })
        );
    }

    #[test]
    fn image_modality_serializes_uppercase() {
        let req = GenerationRequest::new("m", vec![Part::text("x")]).modalities(vec![Modality::Image]);
        let v = serde_json::to_value(req.to_wire()).unwrap();
        assert_eq!(v["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }

    #[test]
    fn output_collects_text_and_images_from_first_candidate() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [
                    { "text": "[1," },
                    { "text": "2]" },
                    { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
                ] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        let out = GenerationOutput::from(resp);
        assert_eq!(out.text, "[1,2]");
        assert_eq!(out.images.len(), 1);
        assert_eq!(out.images[0].data, "QUJD");
    }

    #[test]
    fn concept_uses_camel_case_keys() {
        let c = DesignConcept {
            id: "1".into(),
            name: "n".into(),
            theme: "t".into(),
            description: "d".into(),
            color_palette: vec!["#fff".into()],
            typography: "ty".into(),
            layout_analysis: "la".into(),
            html_preview: "<div/>".into(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert!(v.get("colorPalette").is_some());
        assert!(v.get("layoutAnalysis").is_some());
        assert!(v.get("htmlPreview").is_some());
    }
}
