#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod desktop;
pub mod providers;
pub mod tools;

pub use config::Config;
