//! Lay out item labels onto fixed sheets of 24 and render them for printing.
pub mod context;
pub mod core;
pub mod extract;
pub mod render;
pub mod request;
pub mod resolver;
pub mod server;
pub mod sheet;
