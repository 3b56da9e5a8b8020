pub mod settings;

pub use settings::{AppConfig, LadderSettings, SchedulerSettings, SettingsProvider};
