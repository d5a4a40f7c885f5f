pub mod config;
pub mod dashboard;
pub mod domain;
pub mod repository;
pub mod rx;
pub mod services;
pub mod views;

// Make test_helpers available for integration tests
pub mod test_helpers;

pub use dashboard::Dashboard;
