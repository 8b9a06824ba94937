//! Predict command - score users with the current roster

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use super::{emit, load_input, resolve_as_of};
use crate::classifier::{PredictError, PredictionMethod};
use crate::pipeline::ChurnService;
use crate::reporters::{self, OutputFormat, PredictionView};

pub struct PredictArgs {
    pub method: PredictionMethod,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub by_project: bool,
    pub high_risk: Option<usize>,
    pub as_of: Option<NaiveDate>,
}

/// Run the predict command
pub fn run(service: &ChurnService, input: &Path, args: PredictArgs) -> Result<()> {
    if !service.is_trained() {
        bail!("{}", PredictError::NotReady);
    }

    let records = load_input(input)?;
    let batch = service.predict(&records, args.method, resolve_as_of(args.as_of))?;
    if batch.is_empty() {
        tracing::warn!(
            "No user in {} has enough history to score",
            input.display()
        );
    }

    let view = PredictionView {
        by_project: args.by_project,
        high_risk: args.high_risk,
    };
    emit(
        &reporters::predictions(&batch, view, args.format)?,
        args.output.as_deref(),
    )
}
