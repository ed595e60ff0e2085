pub mod auth;
pub mod browser;
pub mod config;
pub mod courses;
pub mod grades;
pub mod parser;
pub mod report;
#[cfg(test)]
pub mod fixture_server;
