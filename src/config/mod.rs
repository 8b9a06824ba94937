//! Configuration module for gamechurn
//!
//! This module handles:
//! - Feature window and training parameters
//! - Risk tier percentile bands
//! - Model storage location

mod churn_config;

pub use churn_config::{ChurnConfig, StorageSettings, TrainingSettings, PROJECT_CONFIG_FILE};
