pub mod auth;
pub mod config_store;
pub mod rate_limit;
