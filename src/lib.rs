pub mod command;
pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sequence;
pub mod vision;
