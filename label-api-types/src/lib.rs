//! Request and response types shared by the label sheet server and its clients.
pub mod labels;

pub use labels::*;
