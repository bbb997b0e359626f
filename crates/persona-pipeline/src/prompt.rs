//! Prompt construction for enrichment requests.
//!
//! The instruction template is fixed and versioned: [`build_prompt`] is a pure
//! function of the input row, so identical rows always produce identical
//! request payloads. This keeps prompts snapshot-testable without touching
//! the network.

use crate::types::InputRow;

/// Version of the instruction template.
///
/// `v1` asked for one `{"value", "confidence"}` object per field; `v2` asks
/// for a flat five-key object with a single overall confidence. The response
/// parser still accepts the `v1` shape.
pub const PROMPT_VERSION: &str = "v2";

/// Render the fixed instruction template plus the row's two fields.
///
/// Both fields are embedded verbatim. Blank fields are embedded as empty
/// strings rather than skipped, so the prompt shape never varies.
pub fn build_prompt(row: &InputRow) -> String {
    format!(
        "Analyze the following social media user data:\n\
        Full Name: \"{}\"\n\
        Username: \"{}\"\n\n\
        As a world-class cultural and demographic analyst, infer the metrics \
        below from the name and handle alone.\n\n\
        CRITICAL: Your response MUST be a single, valid JSON object with \
        exactly these keys and nothing else.\n\
        Do NOT add markdown fences, commentary, or extra keys.\n\n\
        JSON structure:\n\
        {{\n\
        \"gender\": \"Male\", \"Female\", or \"Unisex/Unknown\",\n\
        \"origin\": \"likely ethno-geographic origin\",\n\
        \"language\": \"language detected in the names\",\n\
        \"persona\": \"inferred interest or category\",\n\
        \"confidence\": overall confidence as a float between 0.0 and 1.0\n\
        }}",
        row.full_name, row.username
    )
}

// ============================================================================
// Tests
// ============================================================================
