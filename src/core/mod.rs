// src/core/mod.rs

pub mod cache;
pub mod codec;
pub mod page;
pub mod partition;
pub mod peers;
pub mod types;
