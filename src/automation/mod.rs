pub mod actions;
pub mod engine;
pub mod operators;

pub use actions::{create_default_registry, ActionHandler, ActionHandlerRegistry};
pub use engine::AutomationEngine;
pub use operators::RegexCache;
