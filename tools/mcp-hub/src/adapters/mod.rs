pub mod http_backend;
pub mod http_repository;
pub mod memory;
pub mod server;
