/// Language codes offered for localization tables, in display order.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("zh_cn", "Simplified Chinese"),
    ("zh_tw", "Traditional Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("de", "German"),
    ("ru", "Russian"),
    ("es", "Spanish"),
    ("pt_br", "Brazilian Portuguese"),
    ("cs", "Czech"),
    ("it", "Italian"),
    ("pl", "Polish"),
    ("uk", "Ukrainian"),
];

pub const DEFAULT_SOURCE_LANGUAGE: &str = "en";
pub const DEFAULT_TARGET_LANGUAGE: &str = "zh_cn";

/// Convert language code to full language name for clearer prompts
pub fn display_name(code: &str) -> String {
    let normalized = code.trim().to_lowercase().replace('-', "_");
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == normalized)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("zh_cn"), "Simplified Chinese");
        assert_eq!(display_name("pt-BR"), "Brazilian Portuguese");
        assert_eq!(display_name("xx"), "xx");
    }
}
