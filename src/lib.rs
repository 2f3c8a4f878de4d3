pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;
pub mod token_generator;
pub mod updater;

pub use config::Config;
pub use error::{Result, TwrError};
pub use server::{router, start_server, AppState};
pub use token_generator::{CommandGenerator, TokenGenerator, TokenPair};
pub use updater::{LavalinkUpdater, Updater};
