pub mod cache;
pub mod config;
pub mod data;
pub mod errors;
pub mod logger;
pub mod types;
