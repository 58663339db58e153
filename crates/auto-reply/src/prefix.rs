//! Response-prefix templates and the per-dispatch model context.

use tracing::debug;

/// Model metadata announced by the resolver once it has picked a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
    pub think_level: Option<String>,
}

/// Per-dispatch template context. Model fields start unset and latch on the
/// first selection event; later selections are ignored so a prefix rendered
/// mid-stream and one rendered at the end agree.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub identity_name: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub model_full: Option<String>,
    pub think_level: Option<String>,
}

impl DispatchContext {
    #[must_use]
    pub fn new(identity_name: Option<String>) -> Self {
        Self {
            identity_name,
            ..Self::default()
        }
    }

    /// Apply a model selection. Set-once: only the first call takes effect.
    pub fn apply(&mut self, selection: &ModelSelection) {
        if self.provider.is_some() || self.model.is_some() {
            debug!(
                provider = %selection.provider,
                model = %selection.model,
                "ignoring repeated model selection"
            );
            return;
        }
        self.provider = Some(selection.provider.clone());
        self.model = Some(extract_short_model_name(&selection.model));
        self.model_full = Some(format!("{}/{}", selection.provider, selection.model));
        self.think_level = Some(
            selection
                .think_level
                .clone()
                .unwrap_or_else(|| "off".to_string()),
        );
    }
}

/// Short display name for a model id: the last path segment, with a
/// trailing `-YYYYMMDD` date suffix removed.
pub fn extract_short_model_name(model: &str) -> String {
    let short = model.rsplit('/').next().unwrap_or(model);
    if let Some((stem, suffix)) = short.rsplit_once('-')
        && suffix.len() == 8
        && suffix.bytes().all(|b| b.is_ascii_digit())
    {
        return stem.to_string();
    }
    short.to_string()
}

/// Render a prefix template. Placeholders: `{identityName}`, `{provider}`,
/// `{model}`, `{modelFull}`, `{thinkLevel}`. Unset fields render empty.
pub fn render_response_prefix(template: &str, ctx: &DispatchContext) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    template
        .replace("{identityName}", &field(&ctx.identity_name))
        .replace("{provider}", &field(&ctx.provider))
        .replace("{model}", &field(&ctx.model))
        .replace("{modelFull}", &field(&ctx.model_full))
        .replace("{thinkLevel}", &field(&ctx.think_level))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("anthropic/claude-opus-4", "claude-opus-4")]
    #[case("claude-3-5-sonnet-20241022", "claude-3-5-sonnet")]
    #[case("gpt-4o", "gpt-4o")]
    #[case("openrouter/meta/llama-3-70b", "llama-3-70b")]
    fn short_model_names(#[case] model: &str, #[case] expected: &str) {
        assert_eq!(extract_short_model_name(model), expected);
    }

    #[test]
    fn apply_is_set_once() {
        let mut ctx = DispatchContext::new(Some("magpie".into()));
        ctx.apply(&ModelSelection {
            provider: "anthropic".into(),
            model: "claude-3-5-sonnet-20241022".into(),
            think_level: None,
        });
        ctx.apply(&ModelSelection {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            think_level: Some("high".into()),
        });

        assert_eq!(ctx.provider.as_deref(), Some("anthropic"));
        assert_eq!(ctx.model.as_deref(), Some("claude-3-5-sonnet"));
        assert_eq!(
            ctx.model_full.as_deref(),
            Some("anthropic/claude-3-5-sonnet-20241022")
        );
        assert_eq!(ctx.think_level.as_deref(), Some("off"));
    }

    #[test]
    fn render_fills_placeholders_and_blanks_unset() {
        let mut ctx = DispatchContext::new(Some("magpie".into()));
        assert_eq!(
            render_response_prefix("[{identityName} {model}]", &ctx),
            "[magpie ]"
        );
        ctx.apply(&ModelSelection {
            provider: "anthropic".into(),
            model: "claude-opus-4".into(),
            think_level: Some("low".into()),
        });
        assert_eq!(
            render_response_prefix("[{identityName} {model} think:{thinkLevel}]", &ctx),
            "[magpie claude-opus-4 think:low]"
        );
    }
}
