//! Configuration module for Pensum.

mod settings;

pub use settings::{AgentSettings, EmbeddingSettings, GeneralSettings, Settings, StoreSettings};
