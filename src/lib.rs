/// CrashKB - crash-fix knowledge base backend
///
/// Token-based sessions with single-use refresh rotation, a three-tier role
/// model, and review workflows for solutions and admin-role applications.
pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod server;
pub mod solution;
pub mod store;
pub mod token;

#[cfg(test)]
mod testing;
