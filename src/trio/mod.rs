// src/trio/mod.rs

pub mod basic;
pub mod clients;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod model;
pub mod prompt;
pub mod reflection;
pub mod service;
pub mod store;
pub mod stream;
pub mod turn_order;

// Flatten the most used types so callers can write trio::ChatService
// instead of trio::service::ChatService.
pub use service::ChatService;
pub use store::ChatStore;
