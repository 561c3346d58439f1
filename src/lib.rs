pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod exec;
pub mod notebook;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod smard;
pub mod store;
