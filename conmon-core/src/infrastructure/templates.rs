// conmon-core/src/infrastructure/templates.rs

// Rendu des messages de résultat: un template (override du check ou table
// intégrée) + le contexte d'agrégation.

use minijinja::{Environment, UndefinedBehavior};

use crate::application::ports::TemplateEngine;
use crate::error::ConmonError;
use crate::infrastructure::error::InfrastructureError;

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Une variable inconnue dans un override est une erreur, pas un blanc.
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        // "3 resources" / "1 resource"
        env.add_filter("plural", |count: i64, word: String| -> String {
            if count == 1 {
                format!("{} {}", count, word)
            } else {
                format!("{} {}s", count, word)
            }
        });

        Self { env }
    }
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaRenderer {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, ConmonError> {
        self.env
            .render_str(template, context)
            .map_err(|e| ConmonError::Infrastructure(InfrastructureError::TemplateError(e)))
    }
}
