pub mod config;
pub mod maven;
pub mod resolver;
pub mod util;
