pub mod adapters;
pub mod config;
pub mod error;
pub mod forms;
pub mod persistence;
pub mod store;
pub mod validation;
