//! Refresh command - retrain, then score with champion and ensemble

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::{emit, load_input, resolve_as_of, spinner};
use crate::cache;
use crate::pipeline::ChurnService;
use crate::reporters::{self, OutputFormat, PredictionView};

/// Run the refresh command
pub fn run(
    service: &ChurnService,
    input: &Path,
    format: OutputFormat,
    export_dir: Option<&Path>,
) -> Result<()> {
    let records = load_input(input)?;
    let as_of = resolve_as_of(None);

    let bar = spinner("Refreshing models and predictions...");
    let report = service.refresh(&records, as_of);
    bar.finish_with_message(format!(
        "{} Refresh finished in {:.2}s",
        style("✓").green(),
        report.elapsed_seconds
    ));

    let view = PredictionView {
        by_project: true,
        high_risk: Some(crate::classifier::DEFAULT_HIGH_RISK_LIMIT),
    };
    for batch in &report.batches {
        let method = batch.method.to_string();
        let path = match export_dir {
            Some(dir) => dir.join(format!("predictions-{method}.json")),
            None => cache::default_export_path(service.store().root(), &method),
        };
        if let Some(parent) = path.parent() {
            cache::ensure_dir(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let rendered = reporters::predictions(batch, view, OutputFormat::Json)?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {} predictions to {}", method, path.display());
    }

    emit(&reporters::refresh(&report, format)?, None)
}
