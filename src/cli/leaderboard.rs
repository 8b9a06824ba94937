//! Leaderboard command - every trained model, best first

use anyhow::Result;

use super::emit;
use crate::pipeline::ChurnService;
use crate::reporters::{self, OutputFormat};

pub fn run(service: &ChurnService, format: OutputFormat) -> Result<()> {
    emit(&reporters::leaderboard(&service.leaderboard(), format)?, None)
}
