// src/lib.rs

pub mod config;
pub mod core;
pub mod corpus;
pub mod error;
pub mod learning;

pub use crate::config::ServiceConfig;
pub use crate::core::cache::{LocalPeer, PageCache};
pub use crate::core::codec::{decode_page, encode_page, DownloadResponse, StandardResponse};
pub use crate::core::page::{FillOutcome, PageCompleteness, ServedPage};
pub use crate::core::partition::PartitionStats;
pub use crate::core::peers::{HashRing, PagePeer, PeerPool};
pub use crate::core::types::{Language, PageKey, TrainingRequest, Word};
pub use crate::corpus::{CorpusSource, MemoryCorpus};
pub use crate::error::{ConfigError, CorpusError, DispatchError, PageError, PageResult, ValidationError};
pub use crate::learning::{spawn_trainer, LearnDispatcher, OverflowPolicy, Trainer};
