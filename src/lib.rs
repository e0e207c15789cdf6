pub mod animation;
pub mod config;
pub mod error_codes;
pub mod history;
pub mod prompt_parser;
pub mod render;
pub mod sandbox;
pub mod script;
pub mod server;
pub mod telemetry;
