pub mod config;
mod download;
mod list;

pub use config::{Config, Options};
pub use download::download;
pub use list::{list, render_table};
