pub mod aggregate;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod table;
pub mod tui;
