pub mod engine;

pub use engine::SlaEngine;
