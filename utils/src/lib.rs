pub mod logging;
pub mod preferences;
