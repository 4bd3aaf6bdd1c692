pub mod bounds;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod task;
pub mod variants;
pub mod writer;
