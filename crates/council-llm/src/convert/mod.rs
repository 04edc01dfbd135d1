//! Conversion between the unified contract and each wire format

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod responses;
