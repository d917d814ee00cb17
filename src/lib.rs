pub mod config;
pub mod constants;
pub mod error;
pub mod etl;
pub mod logging;
pub mod pipeline;
pub mod records;
pub mod sql;
pub mod warehouse;
