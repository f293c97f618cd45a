// src/web/handlers/mod.rs
pub mod scheduler_handlers;
pub mod system_handlers;

pub use scheduler_handlers::*;
pub use system_handlers::*;
