pub mod audit;
pub mod credits;
pub mod error;
pub mod roles;
pub mod tenant;
pub mod types;
pub mod webhooks;
