//! System prompt rendering.
//!
//! The prompt is a pure function of `(source, targets, template)`. [`PromptPreview`]
//! caches the rendered text for display and drops the cache whenever one of
//! its inputs changes.

use crate::languages::display_name;

const SOURCE_PLACEHOLDER: &str = "{source}";
const TARGET_PLACEHOLDER: &str = "{target}";

/// Substitute the source and target display names into `template`.
/// Several targets are joined with `,`.
pub fn render_prompt(template: &str, source_name: &str, target_names: &[String]) -> String {
    template
        .replace(SOURCE_PLACEHOLDER, source_name)
        .replace(TARGET_PLACEHOLDER, &target_names.join(","))
}

/// Prompt for a single target-language pass.
pub fn pass_prompt(template: &str, source: &str, target: &str) -> String {
    render_prompt(template, &display_name(source), &[display_name(target)])
}

/// Prompt text shown to the user while a job is being configured.
#[derive(Debug, Clone)]
pub struct PromptPreview {
    template: String,
    source: Option<String>,
    targets: Vec<String>,
    cached: Option<String>,
}

impl PromptPreview {
    pub fn new<S: Into<String>>(template: S) -> Self {
        Self {
            template: template.into(),
            source: None,
            targets: Vec::new(),
            cached: None,
        }
    }

    pub fn set_template<S: Into<String>>(&mut self, template: S) {
        self.template = template.into();
        self.invalidate();
    }

    pub fn set_source<S: Into<String>>(&mut self, source: S) {
        self.source = Some(source.into());
        self.invalidate();
    }

    /// Add the target when absent, remove it when present. Selection order is kept.
    pub fn toggle_target(&mut self, target: &str) {
        if let Some(pos) = self.targets.iter().position(|t| t == target) {
            self.targets.remove(pos);
        } else {
            self.targets.push(target.to_string());
        }
        self.invalidate();
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_stale(&self) -> bool {
        self.cached.is_none()
    }

    /// Rendered prompt, recomputed only after an invalidation.
    pub fn text(&mut self) -> &str {
        if self.cached.is_none() {
            let source = self.source.as_deref().map(display_name).unwrap_or_default();
            let targets: Vec<String> = self.targets.iter().map(|t| display_name(t)).collect();
            self.cached = Some(render_prompt(&self.template, &source, &targets));
        }
        self.cached.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_joins_targets() {
        let text = render_prompt(
            "from {source} to {target}",
            "English",
            &["Japanese".to_string(), "Korean".to_string()],
        );
        assert_eq!(text, "from English to Japanese,Korean");
    }

    #[test]
    fn test_pass_prompt_uses_display_names() {
        assert_eq!(pass_prompt("{source}->{target}", "en", "ja"), "English->Japanese");
    }

    #[test]
    fn test_preview_invalidates_on_change() {
        let mut preview = PromptPreview::new("{source}:{target}");
        preview.set_source("en");
        preview.toggle_target("zh_cn");
        assert_eq!(preview.text(), "English:Simplified Chinese");
        assert!(!preview.is_stale());

        preview.toggle_target("ja");
        assert!(preview.is_stale());
        assert_eq!(preview.text(), "English:Simplified Chinese,Japanese");

        preview.toggle_target("zh_cn");
        assert_eq!(preview.text(), "English:Japanese");
        assert_eq!(preview.targets(), &["ja".to_string()]);
    }
}
