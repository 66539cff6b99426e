pub mod discovery;
pub mod inspector_service;
pub mod orchestration;
pub mod repository;
