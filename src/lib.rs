pub mod api;
pub mod cli;
pub mod download;
pub mod engine;
pub mod http_client;
pub mod session;
pub mod throttle;
