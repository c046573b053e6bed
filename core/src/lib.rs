mod client;
mod client_test;
mod config;
mod service;

pub use client::LokiClient;
pub use config::{Config, DebugConfig, LokiConfig};
pub use service::{LabelAnalysis, LabelAnalysisResults, LogEntryToSave, LogVolume, LokiService};

pub use loki_api::*;
