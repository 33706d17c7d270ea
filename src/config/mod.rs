pub mod file;
pub mod settings;

pub use settings::{Settings, TwilioSettings};
