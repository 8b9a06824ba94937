//! Train command - fit the model panel and publish the roster

use anyhow::Result;
use console::style;
use std::path::Path;

use super::{emit, load_input, spinner};
use crate::pipeline::ChurnService;
use crate::reporters::{self, OutputFormat};

/// Run the train command
pub fn run(service: &ChurnService, input: &Path, format: OutputFormat) -> Result<()> {
    let records = load_input(input)?;

    let bar = spinner(&format!("Training on {} activity rows...", records.len()));
    let report = service.train(&records);
    if report.is_trained() {
        bar.finish_with_message(format!(
            "{} Trained {} models",
            style("✓").green(),
            report.models_trained
        ));
    } else {
        bar.finish_with_message(format!("{} Training skipped", style("!").yellow()));
    }

    emit(&reporters::train(&report, format)?, None)
}
