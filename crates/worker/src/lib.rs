//! Background processing: the webhook job worker and the credit expiry loop.

pub mod config;
pub mod effects;
pub mod expiry;
pub mod processor;
pub mod runner;
