pub mod config;
pub mod lang;
pub mod pipeline;
pub mod progress;
pub mod sources;
pub mod survey;
pub mod textutil;
pub mod writer;
