pub mod config;
pub mod registry;

pub use config::{OutputFormat, PipelineSettings, SynthesisConfig};
pub use registry::SynthesisConfigRegistry;
