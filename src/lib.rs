pub mod catalog;
pub mod commands;
pub mod download;
pub mod http;
pub mod logger;
pub mod runtime;
