use serde_json::Value;

use crate::wire::DesignConcept;

pub const CONCEPT_COUNT: usize = 4;

fn code_rules(intent: &str) -> String {
    format!(r#"Rules:
- Use "export default function" for components.
- Use "lucide-react" for icons. KEY RULE: You MUST import every icon you use. Example: 'import {{ Menu, Leaf, ArrowRight }} from "lucide-react";'
- Use standard Tailwind utility classes for ALL styling based on the Concept's color palette and theme.
- Make it LOOK PREMIUM. Use deep gradients, glassmorphism, or clean whitespace.
- Ensure it is responsive (mobile-first).
- IMPORTANT: Do NOT use placeholder image hosts like "via.placeholder.com". Use real, high-quality images from Unsplash.
  - Example: <img src="https://images.unsplash.com/photo-1497935586351-b67a49e012bf?auto=format&fit=crop&w=800&q=80" />
  - Pick varied images relevant to "{intent}".
- The layout must start with a Hero section that takes at least 80vh."#)
}

pub const REQUIRED_FILES: &[(&str, &str)] = &[
    ("/App.js", "Main entry point, export default function App"),
    ("/styles.css", "Tailwind directives are assumed, but specific custom styles can go here"),
    ("/components/Navbar.js", ""),
    ("/components/Hero.js", ""),
    ("/components/Feature.js", ""),
    ("/components/Footer.js", ""),
];

fn required_files() -> String {
    REQUIRED_FILES
        .iter()
        .map(|(path, note)| {
            if note.is_empty() {
                format!("- {path}")
            } else {
                format!("- {path} ({note})")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the concepts call. The sketch travels as a separate inline part.
pub fn concepts_prompt(intent: &str) -> String {
    format!(r#"You are an AI Design Engine.
User Intent: "{intent}"

Provided is a user's rough sketch.
Generate {CONCEPT_COUNT} distinct, high-fidelity design concepts.
Analyze the sketch layout heavily.

Output a JSON Array of exactly {CONCEPT_COUNT} objects with keys: id, name, theme, description, colorPalette, typography, layoutAnalysis.

Rules:
- "theme" and "typography" are plain strings.
- "colorPalette" is an array of hex color strings.
- "htmlPreview" is NOT needed here. It is generated separately.
- "description" should be visual and descriptive enough to drive an image generator.
- Do NOT use markdown or code fences. Just raw JSON."#)
}

/// Prompt for the code call. `concept` must already have its preview removed;
/// see [`strip_preview`].
pub fn code_prompt(intent: &str, concept: &Value) -> String {
    format!(r#"You are an AI Code Generator.

Project Intent: "{intent}"
Selected Concept: {concept}

Generate a complete, running React application using Tailwind CSS.
The output must be a standard React project structure that works in CodeSandbox/Sandpack.

Required Files:
{files}

{rules}

Return the result as a JSON object where keys are file paths (e.g., "/App.js") and values are the code content (strings).
Do NOT use markdown. Just raw JSON."#,
        files = required_files(),
        rules = code_rules(intent),
    )
}

pub fn image_prompt(concept: &DesignConcept, intent: &str) -> String {
    format!(
        "A high quality website design screenshot for: {}. {} style. {}. User intent: {}.",
        concept.name, concept.theme, concept.description, intent
    )
}

/// The preview is a base64 image; it is useless to the code model and large.
pub fn strip_preview(concept: &Value) -> Value {
    let mut v = concept.clone();
    if let Value::Object(m) = &mut v {
        m.remove("htmlPreview");
    }
    v
}
