//! Token lifecycle management.

pub mod manager;

pub use manager::TokenLifecycleManager;
