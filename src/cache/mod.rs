//! On-disk locations for persisted state

pub mod paths;

pub use paths::{data_dir, default_export_path, default_models_dir, ensure_dir};
