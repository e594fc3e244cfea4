pub mod config;
pub mod display;
pub mod error;
pub mod library;
pub mod logging;
pub mod qr;
pub mod resolver;
pub mod sequence_store;
pub mod sequencer;
pub mod settings;
pub mod settings_file;
pub mod web;
pub mod tasks {
    pub mod watch;
}

pub use display::DisplayService;
pub use error::{DisplayError, Result};
