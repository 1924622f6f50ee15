pub mod connectors;
pub mod events;
pub mod investigations;
pub mod reports;
