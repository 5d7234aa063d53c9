pub mod action;
pub mod blueprint;
pub mod cleanup;
pub mod config;
pub mod docs;
pub mod error;
pub mod features;
pub mod gate;
pub mod io;
pub mod materialize;
pub mod packs;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod project_state;
pub mod scaffold;
pub mod state;
pub mod templates;
pub mod types;
pub mod validate;

pub use error::{InitError, Result};
