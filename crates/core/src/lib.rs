pub mod config;
pub mod models;
pub mod security;
pub mod snapshot;
pub mod stats;
pub mod util;
