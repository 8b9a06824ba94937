//! Text (terminal) reporter with colors and formatting

use console::style;

use super::PredictionView;
use crate::classifier::{fmt_auc, PredictionBatch};
use crate::models::RiskTier;
use crate::pipeline::{
    LeaderboardEntry, ModelInfo, ModelStatus, RefreshReport, RunStatus, TrainReport,
};

const RULE: &str = "──────────────────────────────────────";

fn status_tag(status: RunStatus) -> String {
    match status {
        RunStatus::Success => style("[OK]").green().bold().to_string(),
        RunStatus::PartialSuccess => style("[PARTIAL]").yellow().bold().to_string(),
    }
}

fn tier_label(tier: RiskTier) -> String {
    match tier {
        RiskTier::High => style("High").red().bold().to_string(),
        RiskTier::Medium => style("Medium").yellow().to_string(),
        RiskTier::Low => style("Low").green().to_string(),
    }
}

fn header(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n", style(title).bold()));
    out.push_str(&format!("{}\n", style(RULE).dim()));
}

fn auc_warning(out: &mut String) {
    out.push_str(&format!(
        "  {} ROC-AUC is undefined: the held-out labels contain a single class\n",
        style("Warning:").yellow().bold()
    ));
}

pub fn train(report: &TrainReport) -> String {
    let mut out = String::new();
    header(&mut out, "gamechurn training");
    out.push_str(&format!("{} {}\n", status_tag(report.status), report.message));

    if let Some(champion) = &report.champion {
        out.push_str(&format!(
            "  Champion: {}  ROC-AUC: {}  Accuracy: {:.4}\n",
            style(champion).cyan().bold(),
            fmt_auc(report.roc_auc),
            report.accuracy.unwrap_or(0.0)
        ));
        out.push_str(&format!("  Ensemble: {}\n", report.ensemble.join(", ")));
        out.push_str(&format!(
            "  Samples: {} ({} held out)\n",
            report.training_samples, report.test_samples
        ));
        if let Some(generation) = report.generation {
            let saved = if report.persisted {
                style("saved").green().to_string()
            } else {
                style("not saved").red().to_string()
            };
            out.push_str(&format!("  Generation: {generation} ({saved})\n"));
        }
    } else {
        out.push_str(&format!("  Samples: {}\n", report.training_samples));
    }

    for skipped in &report.skipped {
        out.push_str(&format!(
            "  {} {}: {}\n",
            style("[--]").dim(),
            skipped.family,
            skipped.reason
        ));
    }
    if report.auc_warning {
        auc_warning(&mut out);
    }
    out
}

pub fn predictions(batch: &PredictionBatch, view: PredictionView) -> String {
    let mut out = String::new();
    let summary = batch.summary();
    header(&mut out, &format!("gamechurn predictions ({})", batch.method));

    out.push_str(&format!(
        "  Users: {}  Mean churn probability: {:.3}\n",
        summary.total_users, summary.avg_churn_probability
    ));
    out.push_str(&format!(
        "  {} {}  {} {}  {} {}\n",
        tier_label(RiskTier::High),
        summary.high_risk,
        tier_label(RiskTier::Medium),
        summary.medium_risk,
        tier_label(RiskTier::Low),
        summary.low_risk
    ));
    out.push_str(&format!(
        "  {}\n",
        style(format!(
            "Thresholds for this batch: high > {:.3}, medium > {:.3}",
            summary.thresholds.high, summary.thresholds.medium
        ))
        .dim()
    ));
    out.push_str(&format!("  Models: {}\n", batch.models.join(", ")));

    if view.by_project {
        out.push_str(&format!("\n{}\n", style("BY PROJECT").bold()));
        out.push_str(&format!(
            "{}\n",
            style("  PROJECT               USERS   MEAN    HIGH  MEDIUM  LOW").dim()
        ));
        for p in batch.by_project() {
            let name: String = p.project.chars().take(20).collect();
            out.push_str(&format!(
                "  {:<20}  {:>5}   {:.3}  {:>4}  {:>6}  {:>3}\n",
                name,
                p.total_users,
                p.avg_churn_probability,
                p.high.users,
                p.medium.users,
                p.low.users
            ));
        }
    }

    if let Some(limit) = view.high_risk {
        let high = batch.high_risk(limit);
        out.push_str(&format!(
            "\n{} ({} shown)\n",
            style("HIGH RISK").red().bold(),
            high.len()
        ));
        if high.is_empty() {
            out.push_str(&format!("  {}\n", style("No high-risk users").dim()));
        }
        for (i, p) in high.iter().enumerate() {
            out.push_str(&format!(
                "  {:>3}. {}  {}  {:.3}\n",
                i + 1,
                p.user_id,
                style(&p.project).dim(),
                p.churn_probability
            ));
        }
    }
    out
}

pub fn refresh(report: &RefreshReport) -> String {
    let mut out = String::new();
    header(&mut out, "gamechurn refresh");
    out.push_str(&format!(
        "{} {} ({:.2}s)\n",
        status_tag(report.status),
        report.message,
        report.elapsed_seconds
    ));
    out.push_str(&format!(
        "  Models trained: {}  Training samples: {}\n",
        report.models_trained, report.training_samples
    ));
    if let Some(champion) = &report.champion {
        out.push_str(&format!(
            "  Champion: {}  ROC-AUC: {}  Accuracy: {:.4}\n",
            style(champion).cyan().bold(),
            fmt_auc(report.roc_auc),
            report.accuracy.unwrap_or(0.0)
        ));
        out.push_str(&format!("  Ensemble: {}\n", report.ensemble.join(", ")));
    }
    out.push_str(&format!(
        "  Predictions generated: {}\n",
        report.predictions_generated
    ));
    if report.auc_warning {
        auc_warning(&mut out);
    }
    out
}

pub fn leaderboard(entries: &[LeaderboardEntry]) -> String {
    let mut out = String::new();
    header(&mut out, "gamechurn leaderboard");
    if entries.is_empty() {
        out.push_str(&format!(
            "  No models trained yet. Run {}\n",
            style("gamechurn train").cyan()
        ));
        return out;
    }

    out.push_str(&format!(
        "{}\n",
        style("  #  MODEL                 ROC-AUC    ACC     PREC    RECALL  SECS").dim()
    ));
    for e in entries {
        let marker = if e.is_champion {
            style("*").yellow().bold().to_string()
        } else if e.in_ensemble {
            style("+").cyan().to_string()
        } else {
            " ".to_string()
        };
        out.push_str(&format!(
            "{} {:>2}  {:<20}  {:<9}  {:.4}  {:.4}  {:.4}  {:.2}\n",
            marker,
            e.rank,
            e.model,
            fmt_auc(e.roc_auc),
            e.accuracy,
            e.precision,
            e.recall,
            e.training_seconds
        ));
    }
    out.push_str(&format!(
        "  {}\n",
        style("* champion  + ensemble member").dim()
    ));
    out
}

pub fn info(info: &ModelInfo) -> String {
    let mut out = String::new();
    header(&mut out, "gamechurn info");

    match (info.status, &info.champion) {
        (ModelStatus::Trained, Some(c)) => {
            out.push_str(&format!(
                "  {} Generation {}\n",
                style("[OK]").green(),
                info.generation.unwrap_or(0)
            ));
            out.push_str(&format!(
                "  Champion: {}  ROC-AUC: {}  Accuracy: {:.4}\n",
                style(&c.name).cyan().bold(),
                fmt_auc(c.roc_auc),
                c.accuracy
            ));
            out.push_str(&format!(
                "  Trained at: {}\n",
                c.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!(
                "  Ensemble ({}): {}\n",
                info.ensemble_size,
                info.ensemble.join(", ")
            ));
        }
        _ => out.push_str(&format!(
            "  {} No trained model. Run {}\n",
            style("[--]").dim(),
            style("gamechurn train").cyan()
        )),
    }

    out.push_str(&format!(
        "  Prediction window: {} days\n",
        info.prediction_window_days
    ));
    out.push_str(&format!("  Features: {}\n", info.features.join(", ")));
    let families: Vec<String> = info.available_models.iter().map(|f| f.to_string()).collect();
    out.push_str(&format!("  Available models: {}\n", families.join(", ")));
    out.push_str(&format!("  Models dir: {}\n", style(&info.models_dir).dim()));

    if info.config_sources.is_empty() {
        out.push_str(&format!("  Config: {}\n", style("defaults").dim()));
    } else {
        for source in &info.config_sources {
            out.push_str(&format!("  Config: {}\n", style(source).dim()));
        }
    }

    if !info.history.is_empty() {
        out.push_str(&format!("\n{}\n", style("HISTORY").bold()));
        for h in info.history.iter().rev() {
            out.push_str(&format!(
                "  {}  {:<20}  {}\n",
                h.timestamp.format("%Y-%m-%d %H:%M"),
                h.champion,
                fmt_auc(h.roc_auc)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::{test_batch, test_leaderboard, test_train_report};

    #[test]
    fn test_train_text() {
        let out = train(&test_train_report());
        assert!(out.contains("random_forest"));
        assert!(out.contains("0.8750"));
        assert!(out.contains("Generation: 4"));
        assert!(!out.contains("Warning"));
    }

    #[test]
    fn test_train_text_warns_on_undefined_auc() {
        let mut report = test_train_report();
        report.roc_auc = None;
        report.auc_warning = true;
        let out = train(&report);
        assert!(out.contains("undefined"));
        assert!(out.contains("Warning"));
    }

    #[test]
    fn test_predictions_text_sections() {
        let batch = test_batch();
        let plain = predictions(&batch, PredictionView::default());
        assert!(plain.contains("Users: 4"));
        assert!(plain.contains("high > 0.500"));
        assert!(!plain.contains("BY PROJECT"));

        let full = predictions(
            &batch,
            PredictionView {
                by_project: true,
                high_risk: Some(10),
            },
        );
        assert!(full.contains("BY PROJECT"));
        assert!(full.contains("arena"));
        assert!(full.contains("HIGH RISK"));
        // Highest probability first.
        let w1 = full.find("w1").unwrap();
        let w4 = full.find("w4").unwrap();
        assert!(w1 < w4);
    }

    #[test]
    fn test_leaderboard_text() {
        let out = leaderboard(&test_leaderboard());
        assert!(out.contains("random_forest"));
        assert!(out.contains("undefined"));
        assert!(leaderboard(&[]).contains("No models trained yet"));
    }
}
