pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod table;
pub mod world;
