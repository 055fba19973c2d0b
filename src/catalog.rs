use crate::models::{BackendModel, ImageDialect, ProviderConfig, ProviderKind};

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const KNOWN_API_SUFFIXES: [&str; 3] = ["/v1/chat/completions", "/v1/completions", "/v1/embeddings"];

struct CatalogEntry {
    name: &'static str,
    endpoint: &'static str,
    kind: ProviderKind,
    models: &'static [(&'static str, &'static str)],
}

const PROVIDERS: &[CatalogEntry] = &[
    CatalogEntry {
        name: "SiliconFlow",
        endpoint: "https://api.siliconflow.cn/v1/chat/completions",
        kind: ProviderKind::Chat,
        models: &[
            ("DeepSeek-V3.2", "deepseek-ai/DeepSeek-V3.2"),
            ("DeepSeek-R1", "deepseek-ai/DeepSeek-R1"),
            ("DeepSeek-V3", "deepseek-ai/DeepSeek-V3"),
            ("Qwen3-32B", "Qwen/Qwen3-32B"),
            ("Qwen3-14B", "Qwen/Qwen3-14B"),
            ("Qwen3-Coder-30B-A3B-Instruct", "Qwen/Qwen3-Coder-30B-A3B-Instruct"),
        ],
    },
    CatalogEntry {
        name: "Volcengine",
        endpoint: "https://ark.cn-beijing.volces.com/api/v3/chat/completions",
        kind: ProviderKind::Chat,
        models: &[
            ("DeepSeek-V3.1", "DeepSeek-V3.1"),
            ("Kimi-K2", "Kimi-K2"),
            ("DeepSeek-R1", "DeepSeek-R1"),
            ("Doubao-1.5-pro", "Doubao-1.5-pro-32k"),
            ("Doubao-1.5-lite", "Doubao-1.5-lite-32k"),
        ],
    },
    CatalogEntry {
        name: "SoruxGPT",
        endpoint: "https://ai.soruxgpt.com/v1/chat/completions",
        kind: ProviderKind::Chat,
        models: &[
            ("ChatGPT-4o", "chatgpt-4o"),
            ("Claude-Sonnet", "claude-sonnet"),
            ("DeepSeek-Reasoner", "deepseek-reasoner"),
            ("Gemini-2.5", "gemini-2.5"),
            ("GPT-3.5-Turbo", "gpt-3.5-turbo"),
        ],
    },
    CatalogEntry {
        name: "OpenAI",
        endpoint: DEFAULT_CHAT_ENDPOINT,
        kind: ProviderKind::Chat,
        models: &[
            ("GPT-4o", "gpt-4o"),
            ("GPT-4o-mini", "gpt-4o-mini"),
            ("O1-mini", "o1-mini"),
        ],
    },
    CatalogEntry {
        name: "SiliconFlow Images",
        endpoint: "https://api.siliconflow.cn/v1/images/generations",
        kind: ProviderKind::ImageGeneration(ImageDialect::SiliconFlow),
        models: &[
            ("Kolors", "Kwai-Kolors/Kolors"),
            ("Qwen-Image", "Qwen/Qwen-Image"),
            ("Qwen-Image-Edit-2509", "Qwen/Qwen-Image-Edit-2509"),
        ],
    },
    CatalogEntry {
        name: "Doubao Images",
        endpoint: "https://ark.cn-beijing.volces.com/api/v3/images/generations",
        kind: ProviderKind::ImageGeneration(ImageDialect::Standard),
        models: &[
            ("Seedream 4.0", "Doubao-Seedream-4.0"),
            ("Seedream 3.0", "Doubao-Seedream-3.0-t2i"),
        ],
    },
];

const LOCAL_MODELS: &[(&str, &str, &str)] = &[
    (
        "Qwen3-0.6B-MNN",
        "qwen3-0.6b-mnn",
        "models/qwen3_06b_mnn_model/llm.mnn",
    ),
    (
        "MobileLLM-125M-MNN",
        "mobilellm-125m-mnn",
        "models/mobilellm_125m_mnn_model/llm.mnn",
    ),
];

pub fn known_provider(name: &str, credential: &str) -> Option<ProviderConfig> {
    let entry = PROVIDERS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name.trim()))?;

    let mut provider = ProviderConfig::new(entry.name, entry.endpoint, credential);
    provider.kind = entry.kind;
    provider.models = entry
        .models
        .iter()
        .map(|(display, code)| BackendModel::new(*display, *code))
        .collect();
    Some(provider)
}

pub fn provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|entry| entry.name).collect()
}

pub fn resolve_provider(name: &str, custom_endpoint: Option<&str>, credential: &str) -> ProviderConfig {
    let custom_endpoint = custom_endpoint
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty());

    match (known_provider(name, credential), custom_endpoint) {
        (Some(provider), None) => provider,
        (Some(mut provider), Some(endpoint)) => {
            provider.endpoint = normalize_endpoint(endpoint);
            provider
        }
        (None, endpoint) => {
            ProviderConfig::new(name.trim(), normalize_endpoint(endpoint.unwrap_or_default()), credential)
        }
    }
}

pub fn local_models() -> Vec<BackendModel> {
    LOCAL_MODELS
        .iter()
        .map(|(display, code, path)| BackendModel::new(*display, *code).with_local_path(*path))
        .collect()
}

pub fn local_model(api_code: &str) -> Option<BackendModel> {
    local_models()
        .into_iter()
        .find(|model| model.api_code == api_code)
}

pub fn normalize_endpoint(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_CHAT_ENDPOINT.to_owned();
    }

    if KNOWN_API_SUFFIXES
        .iter()
        .any(|suffix| trimmed.ends_with(suffix))
        || trimmed.contains("/v1/")
        || trimmed.contains("/images/generations")
    {
        return trimmed.to_owned();
    }

    let with_scheme = if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    format!("{with_scheme}/v1/chat/completions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_keeps_full_api_urls() {
        assert_eq!(
            normalize_endpoint("https://ai.soruxgpt.com/v1/chat/completions/"),
            "https://ai.soruxgpt.com/v1/chat/completions"
        );
        assert_eq!(
            normalize_endpoint("https://proxy.test/v1/responses"),
            "https://proxy.test/v1/responses"
        );
    }

    #[test]
    fn normalization_completes_bare_hosts() {
        assert_eq!(
            normalize_endpoint("ai.soruxgpt.com/"),
            "https://ai.soruxgpt.com/v1/chat/completions"
        );
        assert_eq!(
            normalize_endpoint("http://127.0.0.1:8080"),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
        assert_eq!(normalize_endpoint("  "), DEFAULT_CHAT_ENDPOINT);
    }

    #[test]
    fn known_providers_carry_models_and_kind() {
        let provider = known_provider("siliconflow images", "key").expect("provider should exist");
        assert_eq!(
            provider.kind,
            ProviderKind::ImageGeneration(ImageDialect::SiliconFlow)
        );
        assert!(!provider.models.is_empty());
        assert!(provider_names().contains(&"OpenAI"));
    }

    #[test]
    fn unknown_provider_uses_normalized_custom_endpoint() {
        let provider = resolve_provider("my-proxy", Some("proxy.example.com"), "key");
        assert_eq!(provider.name, "my-proxy");
        assert_eq!(provider.endpoint, "https://proxy.example.com/v1/chat/completions");
        assert_eq!(provider.kind, ProviderKind::Chat);
        assert!(provider.models.is_empty());
    }

    #[test]
    fn local_models_have_paths() {
        let model = local_model("mobilellm-125m-mnn").expect("local model should exist");
        assert_eq!(
            model.local_path.as_deref(),
            Some("models/mobilellm_125m_mnn_model/llm.mnn")
        );
        assert!(local_model("missing").is_none());
    }
}
