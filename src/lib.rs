pub mod apply;
pub mod cli;
pub mod config;
pub mod controller;
pub mod errors;
pub mod exec;
pub mod image;
pub mod log;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod safety;
pub mod sanitize;
pub mod server;
pub mod ux;
pub mod wire;
pub mod wizard;
