#![allow(dead_code)]

pub mod config;
pub mod council;
pub mod mock_llm;
