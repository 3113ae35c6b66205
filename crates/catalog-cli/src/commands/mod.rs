pub mod common;
pub mod export;
pub mod list;
pub mod search;
pub mod stats;
