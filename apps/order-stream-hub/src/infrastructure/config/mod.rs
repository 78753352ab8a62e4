//! Configuration Module
//!
//! Configuration loading for the order stream hub.

mod settings;

pub use settings::{
    ConfigError, DeliverySettings, FeedSettings, HubConfig, ServerSettings,
};
