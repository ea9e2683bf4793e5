pub mod assemble;
pub mod config;
pub mod detect;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod severity;
pub mod video;
