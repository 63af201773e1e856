// conmon-core/src/application/ports/renderer.rs

use crate::error::ConmonError;

/// Renders result-message templates against a JSON context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, ConmonError>;
}
