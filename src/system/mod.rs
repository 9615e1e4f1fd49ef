//! Core system components for rover operation
pub mod event;
pub mod indicator;
pub mod resources;
