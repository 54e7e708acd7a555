#[macro_use]
extern crate rust_i18n;

pub mod components;
pub mod config;
pub mod error;
#[cfg(feature = "web-interface")]
pub mod server;
pub mod shutdown;
pub mod startup;
pub mod utils;

pub use components::agent::{ExecutionResult, Status};
pub use components::CalendarAgent;

// Initialize i18n
i18n!("locales", fallback = "en");
