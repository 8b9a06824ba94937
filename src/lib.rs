//! gamechurn - churn prediction for on-chain game activity
//!
//! Turns daily per-user activity into behavioural features, trains a panel
//! of classifiers, keeps the best model (champion) and the top few
//! (ensemble), and scores users into Low/Medium/High churn risk tiers.

pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod reporters;
