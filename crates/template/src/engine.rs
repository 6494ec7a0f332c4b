//! Template rendering over a flattened context.
//!
//! Templates are `MiniJinja` (Jinja2-compatible): `{{ path.to.value }}`
//! substitution, `{% if %}` blocks, and a small set of helper filters. The
//! environment runs with a fuel limit and chainable undefined values, so a
//! template can neither loop forever nor fail on a missing variable.

use minijinja::{Environment, UndefinedBehavior};
use tracing::warn;

/// Fuel limit for template evaluation (denial-of-service protection).
const FUEL_LIMIT: u64 = 50_000;

/// Default format for the `date` filter.
const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// A reusable rendering environment.
///
/// Construction registers the helper filters once; rendering compiles the
/// template string on the fly, which is cheap at automation-response sizes.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_fuel(Some(FUEL_LIMIT));
        // Missing variables render empty, and attribute access on a missing
        // variable stays missing instead of erroring.
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        env.add_filter("uppercase", |value: String| value.to_uppercase());
        env.add_filter("lowercase", |value: String| value.to_lowercase());
        env.add_filter("capitalize", capitalize);
        env.add_filter("date", format_date);

        Self { env }
    }

    /// Render a text template against the context.
    ///
    /// Unresolved variables render as empty strings. Malformed template
    /// syntax falls back to the original, unrendered template string and
    /// logs a warning; this method never fails.
    #[must_use]
    pub fn render_text(&self, template: &str, context: &serde_json::Value) -> String {
        let ctx = minijinja::Value::from_serialize(context);
        match self.env.render_str(template, &ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "template failed to render, returning it unrendered");
                template.to_owned()
            }
        }
    }

    /// Render every string inside a JSON template.
    ///
    /// The template is serialized, rendered as text, and re-parsed; if the
    /// rendered output is no longer valid JSON the original template object
    /// is returned unchanged.
    #[must_use]
    pub fn render_json(
        &self,
        template: &serde_json::Value,
        context: &serde_json::Value,
    ) -> serde_json::Value {
        let Ok(serialized) = serde_json::to_string(template) else {
            return template.clone();
        };
        let rendered = self.render_text(&serialized, context);
        match serde_json::from_str(&rendered) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "rendered JSON template no longer parses, keeping original");
                template.clone()
            }
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Uppercase the first character, lowercase the rest.
fn capitalize(value: String) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => value,
    }
}

/// Format an RFC 3339 timestamp with a chrono format string.
/// Unparseable input, or a broken format string, passes through unchanged.
fn format_date(value: String, format: Option<String>) -> String {
    use std::fmt::Write;

    let format = format.unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_owned());
    let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&value) else {
        return value;
    };
    let mut formatted = String::new();
    match write!(formatted, "{}", dt.format(&format)) {
        Ok(()) => formatted,
        Err(_) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> TemplateEngine {
        TemplateEngine::new()
    }

    #[test]
    fn renders_flat_and_nested_paths() {
        let ctx = json!({"contactName": "maria", "contact": {"email": "m@example.com"}});
        let out = engine().render_text("Oi {{ contactName }} ({{ contact.email }})", &ctx);
        assert_eq!(out, "Oi maria (m@example.com)");
    }

    #[test]
    fn missing_variable_renders_empty() {
        let out = engine().render_text("Hello {{ nobody }}!", &json!({}));
        assert_eq!(out, "Hello !");
    }

    #[test]
    fn missing_nested_variable_renders_empty() {
        let out = engine().render_text("{{ contact.name }}", &json!({}));
        assert_eq!(out, "");
    }

    #[test]
    fn rendering_is_idempotent_for_a_fixed_context() {
        let ctx = json!({"contactName": "Ana"});
        let tpl = "Oi {{ contactName }}, {{ missing }}!";
        let first = engine().render_text(tpl, &ctx);
        let second = engine().render_text(tpl, &ctx);
        assert_eq!(first, second);
        assert_eq!(first, "Oi Ana, !");
    }

    #[test]
    fn malformed_template_falls_back_to_original() {
        let tpl = "Hello {{ broken";
        let out = engine().render_text(tpl, &json!({}));
        assert_eq!(out, tpl);
    }

    #[test]
    fn conditional_blocks() {
        let ctx = json!({"vip": true, "contactName": "Rui"});
        let out = engine().render_text(
            "{% if vip %}Bem-vindo de volta, {{ contactName }}{% else %}Olá{% endif %}",
            &ctx,
        );
        assert_eq!(out, "Bem-vindo de volta, Rui");
    }

    #[test]
    fn helper_filters() {
        let ctx = json!({"name": "maRIA"});
        assert_eq!(engine().render_text("{{ name | uppercase }}", &ctx), "MARIA");
        assert_eq!(engine().render_text("{{ name | lowercase }}", &ctx), "maria");
        assert_eq!(engine().render_text("{{ name | capitalize }}", &ctx), "Maria");
    }

    #[test]
    fn date_filter_formats_and_passes_through_garbage() {
        let ctx = json!({"when": "2026-03-01T14:30:00Z", "junk": "soon"});
        assert_eq!(
            engine().render_text("{{ when | date('%Y-%m-%d') }}", &ctx),
            "2026-03-01"
        );
        assert_eq!(engine().render_text("{{ junk | date }}", &ctx), "soon");
    }

    #[test]
    fn render_json_substitutes_string_leaves() {
        let template = json!({
            "text": "Olá {{ contactName }}",
            "nested": {"tag": "{{ tag }}"},
            "count": 3,
        });
        let ctx = json!({"contactName": "Bia", "tag": "vip"});
        let rendered = engine().render_json(&template, &ctx);
        assert_eq!(rendered["text"], "Olá Bia");
        assert_eq!(rendered["nested"]["tag"], "vip");
        assert_eq!(rendered["count"], 3);
    }

    #[test]
    fn render_json_keeps_original_when_output_breaks() {
        // The rendered value injects a raw quote, producing invalid JSON.
        let template = json!({"text": "{{ payload }}"});
        let ctx = json!({"payload": "he said \"hi\""});
        let rendered = engine().render_json(&template, &ctx);
        assert_eq!(rendered, template);
    }
}
