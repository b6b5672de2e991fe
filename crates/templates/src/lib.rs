//! Message templates and the registry the dispatch engine renders through.
//!
//! A template is bound to a message's JSON parameters once, then rendered in
//! the variant each channel expects (HTML for email and Telegram, Markdown
//! for Discord).

pub mod receipt;

use std::collections::HashMap;

use herald_common::types::{Channel, Template};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    TemplateNotFound(Template),

    #[error("invalid params for template {template}: {source}")]
    InvalidParams {
        template: Template,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown channel '{0}' for template")]
    UnknownChannel(Channel),
}

/// A logical template that can bind raw message parameters.
pub trait MessageTemplate: Send + Sync {
    /// The registry key this template is served under.
    fn template(&self) -> Template;

    /// Validate and capture `params` for rendering.
    fn bind(&self, params: &serde_json::Value) -> Result<Box<dyn BoundTemplate>, TemplateError>;
}

/// A template with its parameters attached.
pub trait BoundTemplate: Send {
    /// Render the variant used by `channel`.
    fn render_for(&self, channel: Channel) -> Result<String, TemplateError>;
}

/// Registry of all available templates, keyed by `Template`.
pub struct TemplateRegistry {
    templates: HashMap<Template, Box<dyn MessageTemplate>>,
}

impl TemplateRegistry {
    /// Create a registry holding every built-in template.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(receipt::ReceiptTemplate::new()));
        registry
    }

    /// Create a registry with no templates.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Add or replace the template served for `template.template()`.
    pub fn register(&mut self, template: Box<dyn MessageTemplate>) {
        self.templates.insert(template.template(), template);
    }

    pub fn get(&self, template: Template) -> Result<&dyn MessageTemplate, TemplateError> {
        self.templates
            .get(&template)
            .map(|t| t.as_ref())
            .ok_or(TemplateError::TemplateNotFound(template))
    }

    /// Look up `template`, bind `params` and render the `channel` variant.
    pub fn render(
        &self,
        template: Template,
        params: &serde_json::Value,
        channel: Channel,
    ) -> Result<String, TemplateError> {
        let content = self.get(template)?.bind(params)?.render_for(channel)?;
        tracing::debug!(template = %template, channel = %channel, "Rendered template");
        Ok(content)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape text interpolated into an HTML variant.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_template_is_registered() {
        let registry = TemplateRegistry::new();
        for template in Template::ALL {
            assert_eq!(registry.get(template).unwrap().template(), template);
        }
    }

    #[test]
    fn test_empty_registry_reports_not_found() {
        let registry = TemplateRegistry::empty();
        let err = registry
            .render(Template::Receipt, &json!({}), Channel::Email)
            .unwrap_err();
        assert!(matches!(err, TemplateError::TemplateNotFound(Template::Receipt)));
    }

    #[test]
    fn test_render_uses_channel_variant() {
        let registry = TemplateRegistry::new();
        let params = json!({"orderId": 7, "commissionAmount": "1.00", "totalAmount": "11.00"});

        let email = registry
            .render(Template::Receipt, &params, Channel::Email)
            .unwrap();
        let telegram = registry
            .render(Template::Receipt, &params, Channel::Telegram)
            .unwrap();

        assert_ne!(email, telegram);
        assert!(email.contains("<h3>"));
        assert!(telegram.contains("<code>7</code>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c'"), "a&lt;b&gt;&amp;&#34;c&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
