// Heuristic model enrichment
//
// Providers rarely declare what a model can do, so capabilities and context
// windows are guessed from the model identifier. These guesses are a
// convenience for pickers and recommendations, never a contract: anything a
// provider declares itself (tags, context_length) wins.

use std::collections::BTreeSet;

use super::Capability;

/// Fallback context window when nothing better is known.
pub const DEFAULT_CONTEXT_WINDOW: usize = 8_192;

const VISION_HINTS: &[&str] = &[
    "vision",
    "gpt-4o",
    "gpt-4-turbo",
    "gpt-4.1",
    "gpt-5",
    "claude-3",
    "claude-sonnet-4",
    "claude-opus-4",
    "gemini",
    "llava",
    "pixtral",
    "-vl",
];

const TOOL_USE_HINTS: &[&str] = &[
    "gpt-4",
    "gpt-5",
    "gpt-3.5-turbo",
    "claude",
    "gemini",
    "mistral-large",
    "command-r",
    "qwen",
    "tool",
    "function",
];

const REASONING_HINTS: &[&str] = &["reason", "thinking", "-r1", "deepseek-r1", "qwq", "gpt-5"];

const CODE_HINTS: &[&str] = &["code", "coder", "codestral", "devstral", "starcoder"];

const MULTIMODAL_HINTS: &[&str] = &[
    "gpt-4o",
    "gpt-5",
    "omni",
    "multimodal",
    "gemini",
    "claude-3",
    "claude-sonnet-4",
    "claude-opus-4",
    "-vl",
];

const IMAGE_GENERATION_HINTS: &[&str] = &[
    "dall-e",
    "gpt-image",
    "image-gen",
    "flux",
    "stable-diffusion",
    "sdxl",
    "imagen",
];

fn matches_any(id: &str, hints: &[&str]) -> bool {
    hints.iter().any(|hint| id.contains(hint))
}

/// OpenAI's o-series ("o1", "o3-mini", "openai/o4-mini") are reasoning models.
fn is_o_series(id: &str) -> bool {
    let name = id.rsplit('/').next().unwrap_or(id);
    let mut chars = name.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Guess capability tags from a model identifier.
pub fn infer_capabilities(model_id: &str) -> BTreeSet<Capability> {
    let id = model_id.to_ascii_lowercase();
    let mut caps = BTreeSet::new();

    if matches_any(&id, IMAGE_GENERATION_HINTS) {
        // Image generators don't chat, so nothing else applies.
        caps.insert(Capability::ImageGeneration);
        return caps;
    }
    if matches_any(&id, VISION_HINTS) {
        caps.insert(Capability::Vision);
    }
    if matches_any(&id, TOOL_USE_HINTS) || is_o_series(&id) {
        caps.insert(Capability::ToolUse);
    }
    if matches_any(&id, REASONING_HINTS) || is_o_series(&id) {
        caps.insert(Capability::Reasoning);
    }
    if matches_any(&id, CODE_HINTS) {
        caps.insert(Capability::Code);
    }
    if matches_any(&id, MULTIMODAL_HINTS) {
        caps.insert(Capability::Multimodal);
    }
    caps
}

/// Best-known context window for a model identifier.
pub fn known_context_window(model_id: &str) -> usize {
    let id = model_id.to_ascii_lowercase();
    if id.contains("gpt-4.1") {
        1_047_576
    } else if id.contains("gpt-5") {
        400_000
    } else if id.contains("gpt-4o") || id.contains("gpt-4-turbo") || id.contains("gpt-4-1106") {
        128_000
    } else if id.contains("gpt-4-32k") {
        32_768
    } else if id.contains("gpt-4") {
        8_192
    } else if id.contains("gpt-35-turbo") || id.contains("gpt-3.5-turbo") {
        16_385
    } else if is_o_series(&id) || id.contains("claude") {
        200_000
    } else if id.contains("gemini") {
        1_000_000
    } else if id.contains("mistral-large") || id.contains("llama-3") {
        128_000
    } else {
        DEFAULT_CONTEXT_WINDOW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt4o_is_vision_multimodal_tool_use() {
        let caps = infer_capabilities("gpt-4o-mini");
        assert!(caps.contains(&Capability::Vision));
        assert!(caps.contains(&Capability::Multimodal));
        assert!(caps.contains(&Capability::ToolUse));
        assert!(!caps.contains(&Capability::Reasoning));
    }

    #[test]
    fn test_o_series_is_reasoning() {
        assert!(infer_capabilities("o3-mini").contains(&Capability::Reasoning));
        assert!(infer_capabilities("openai/o1").contains(&Capability::Reasoning));
        assert!(!infer_capabilities("gpt-4o").contains(&Capability::Reasoning));
    }

    #[test]
    fn test_code_models() {
        assert!(infer_capabilities("qwen-2.5-coder-32b").contains(&Capability::Code));
        assert!(infer_capabilities("mistralai/codestral-2501").contains(&Capability::Code));
    }

    #[test]
    fn test_image_generation_is_exclusive() {
        let caps = infer_capabilities("dall-e-3");
        assert_eq!(caps.len(), 1);
        assert!(caps.contains(&Capability::ImageGeneration));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(infer_capabilities("Claude-3-Opus").contains(&Capability::Vision));
    }

    #[test]
    fn test_unknown_model_has_no_capabilities() {
        assert!(infer_capabilities("my-finetune-v2").is_empty());
    }

    #[test]
    fn test_known_context_windows() {
        assert_eq!(known_context_window("gpt-4o"), 128_000);
        assert_eq!(known_context_window("gpt-4"), 8_192);
        assert_eq!(known_context_window("gpt-35-turbo"), 16_385);
        assert_eq!(known_context_window("claude-sonnet-4-5"), 200_000);
        assert_eq!(known_context_window("something-else"), DEFAULT_CONTEXT_WINDOW);
    }
}
