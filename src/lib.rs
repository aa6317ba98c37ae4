pub mod bank;
pub mod cards;
pub mod config;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod journal;
pub mod lending;
pub mod memory_store;
pub mod report;

pub use bank::{Bank, Transfer};
pub use config::Config;
pub use domain::Error;
pub use engine::{Engine, Summary};
pub use lending::LoanPosting;
pub use memory_store::MemoryStore;
