// Request-scoped viewer context: the middleware builds it, the extractor hands it to handlers

pub mod viewer_context_extractor;
pub mod viewer_context_middleware;

pub use viewer_context_extractor::Vc;
pub use viewer_context_middleware::{viewer_context_middleware, HasProfileLookup};
