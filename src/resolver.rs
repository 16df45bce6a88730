pub mod caching_resolver;
pub mod enquirer;
pub mod mirrors;
pub mod pipeline;
pub mod result;
pub mod strategy;
