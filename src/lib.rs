//! Aplite onboarding: wizard core and backend client.

pub mod api;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
