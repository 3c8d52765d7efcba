// Built-in model catalogs
//
// Served when a provider's model listing cannot be fetched and nothing is
// cached yet. Prices are USD per 1K tokens.

use super::{ModelInfo, Pricing};

struct DefaultModel {
    id: &'static str,
    nickname: &'static str,
    context_window: usize,
    input: f64,
    output: f64,
}

const OPENAI_MODELS: &[DefaultModel] = &[
    DefaultModel {
        id: "gpt-4o",
        nickname: "GPT-4o",
        context_window: 128_000,
        input: 0.0025,
        output: 0.01,
    },
    DefaultModel {
        id: "gpt-4o-mini",
        nickname: "GPT-4o mini",
        context_window: 128_000,
        input: 0.00015,
        output: 0.0006,
    },
    DefaultModel {
        id: "gpt-4.1",
        nickname: "GPT-4.1",
        context_window: 1_047_576,
        input: 0.002,
        output: 0.008,
    },
    DefaultModel {
        id: "o3-mini",
        nickname: "o3-mini",
        context_window: 200_000,
        input: 0.0011,
        output: 0.0044,
    },
    DefaultModel {
        id: "gpt-3.5-turbo",
        nickname: "GPT-3.5 Turbo",
        context_window: 16_385,
        input: 0.0005,
        output: 0.0015,
    },
    DefaultModel {
        id: "dall-e-3",
        nickname: "DALL·E 3",
        context_window: 4_000,
        input: 0.0,
        output: 0.0,
    },
];

const CLAUDE_MODELS: &[DefaultModel] = &[
    DefaultModel {
        id: "claude-sonnet-4-5",
        nickname: "Claude Sonnet 4.5",
        context_window: 200_000,
        input: 0.003,
        output: 0.015,
    },
    DefaultModel {
        id: "claude-opus-4-1",
        nickname: "Claude Opus 4.1",
        context_window: 200_000,
        input: 0.015,
        output: 0.075,
    },
    DefaultModel {
        id: "claude-3-5-haiku-latest",
        nickname: "Claude 3.5 Haiku",
        context_window: 200_000,
        input: 0.0008,
        output: 0.004,
    },
];

const GATEWAY_MODELS: &[DefaultModel] = &[
    DefaultModel {
        id: "openai/gpt-4o-mini",
        nickname: "OpenAI: GPT-4o mini",
        context_window: 128_000,
        input: 0.00015,
        output: 0.0006,
    },
    DefaultModel {
        id: "anthropic/claude-3.5-sonnet",
        nickname: "Anthropic: Claude 3.5 Sonnet",
        context_window: 200_000,
        input: 0.003,
        output: 0.015,
    },
    DefaultModel {
        id: "google/gemini-2.0-flash-001",
        nickname: "Google: Gemini 2.0 Flash",
        context_window: 1_048_576,
        input: 0.0001,
        output: 0.0004,
    },
    DefaultModel {
        id: "deepseek/deepseek-r1",
        nickname: "DeepSeek: R1",
        context_window: 163_840,
        input: 0.0007,
        output: 0.0025,
    },
    DefaultModel {
        id: "qwen/qwen-2.5-coder-32b-instruct",
        nickname: "Qwen2.5 Coder 32B Instruct",
        context_window: 32_768,
        input: 0.00007,
        output: 0.00016,
    },
];

fn build(models: &[DefaultModel], provider: &str) -> Vec<ModelInfo> {
    models
        .iter()
        .map(|m| {
            ModelInfo::new(m.id, provider)
                .with_nickname(m.nickname)
                .with_context_window(m.context_window)
                .with_pricing(Pricing {
                    input: m.input,
                    output: m.output,
                })
        })
        .collect()
}

pub fn openai_models(provider: &str) -> Vec<ModelInfo> {
    build(OPENAI_MODELS, provider)
}

pub fn claude_models(provider: &str) -> Vec<ModelInfo> {
    build(CLAUDE_MODELS, provider)
}

pub fn gateway_models(provider: &str) -> Vec<ModelInfo> {
    build(GATEWAY_MODELS, provider)
}

/// An Azure resource only exposes its own deployments, so the fallback is the
/// configured deployment itself.
pub fn azure_models(provider: &str, deployment: &str) -> Vec<ModelInfo> {
    vec![ModelInfo::new(deployment, provider)]
}
