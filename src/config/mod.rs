//! Configuration management

mod reload;
mod settings;

pub use reload::ReloadingScene;
pub use settings::{load_display_config, AppSettings};
