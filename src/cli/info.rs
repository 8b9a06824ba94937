//! Info command - model state and effective configuration

use anyhow::Result;

use super::emit;
use crate::pipeline::ChurnService;
use crate::reporters::{self, OutputFormat};

pub fn run(service: &ChurnService, format: OutputFormat) -> Result<()> {
    emit(&reporters::info(&service.info(), format)?, None)
}
