// conmon-core/src/application/ports/mod.rs

pub mod renderer;

pub use renderer::TemplateEngine;
