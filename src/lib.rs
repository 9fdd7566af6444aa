pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod deletion;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod storage;

#[cfg(test)]
pub mod testing;

pub use app::{app, AppState};
pub use config::AppConfig;
