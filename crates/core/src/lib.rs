#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progression;
pub mod scoring;
pub mod settings;
pub mod time;

pub use error::Error;
pub use settings::{EngineSettings, EngineSettingsDraft, InputPolicy};
pub use time::Clock;
