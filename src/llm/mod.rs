pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse_parser;
pub mod types;

pub use provider::LlmProvider;
pub use registry::{ProviderRegistry, Role};
