use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>(.*?)</think>").expect("valid think block pattern"));

static THINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?think>").expect("valid think tag pattern"));

pub fn contains_think(text: &str) -> bool {
    THINK_BLOCK.is_match(text)
}

pub fn extract_think(text: &str) -> Vec<String> {
    THINK_BLOCK
        .captures_iter(text)
        .map(|captures| {
            captures
                .get(1)
                .map(|inner| inner.as_str().trim().to_owned())
                .unwrap_or_default()
        })
        .collect()
}

pub fn remove_think(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").into_owned()
}

pub fn strip_think_tags(text: &str) -> String {
    THINK_TAG.replace_all(text, "").into_owned()
}
