//! Unified request and response contract shared by every backend

mod request;
mod response;

pub use request::*;
pub use response::*;
