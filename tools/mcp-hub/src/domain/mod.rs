pub mod capability;
pub mod connection;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod tags;
pub mod tool;
