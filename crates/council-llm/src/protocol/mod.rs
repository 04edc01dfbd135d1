//! Wire format types for each backend family

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod responses;
