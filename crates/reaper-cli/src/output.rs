//! Output formatting for the CLI.

use crate::commands::check::CheckOutcome;
use crate::error::Result;
use colored::*;
use reaper_domain::Decision;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Pretty-printed JSON
    Json,
    /// Bare keys, one per line
    Quiet,
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the outcome of a check pass.
    ///
    /// Quiet mode lists only the records that would be deleted.
    pub fn format_outcomes(&self, outcomes: &[CheckOutcome]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_outcomes_json(outcomes),
            OutputFormat::Table => Ok(self.format_outcomes_table(outcomes)),
            OutputFormat::Quiet => Ok(outcomes
                .iter()
                .filter(|o| matches!(o.decision, Ok(Decision::DeleteNow)))
                .map(|o| o.key.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn format_outcomes_json(&self, outcomes: &[CheckOutcome]) -> Result<String> {
        let rows: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|o| {
                let mut row = serde_json::json!({
                    "kind": o.key.kind.as_str(),
                    "namespace": o.key.namespace,
                    "name": o.key.name,
                });
                match &o.decision {
                    Ok(decision) => {
                        row["decision"] = serde_json::json!(decision_name(decision));
                        if let Some(delay) = decision.requeue_after() {
                            row["requeue_after_secs"] = serde_json::json!(delay.as_secs_f64());
                        }
                    }
                    Err(e) => {
                        row["decision"] = serde_json::json!("error");
                        row["error"] = serde_json::json!(e);
                    }
                }
                row
            })
            .collect();

        Ok(serde_json::to_string_pretty(&rows)?)
    }

    fn format_outcomes_table(&self, outcomes: &[CheckOutcome]) -> String {
        if outcomes.is_empty() {
            return self.colorize("No records found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Kind", "Namespace", "Name", "Decision"]);
        for outcome in outcomes {
            let decision = match &outcome.decision {
                Ok(decision @ Decision::DeleteNow) => self.colorize(&decision.to_string(), "red"),
                Ok(decision @ Decision::RequeueAfter(_)) => self.colorize(&decision.to_string(), "cyan"),
                Ok(decision) => decision.to_string(),
                Err(e) => self.colorize(&format!("error: {}", e), "yellow"),
            };
            builder.push_record([
                outcome.key.kind.as_str(),
                outcome.key.namespace.as_deref().unwrap_or("-"),
                outcome.key.name.as_str(),
                decision.as_str(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// Format a fingerprint.
    pub fn format_fingerprint(&self, fingerprint: &str, checksum: u32) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "fingerprint": fingerprint,
                "checksum": checksum,
            }))?),
            OutputFormat::Table | OutputFormat::Quiet => Ok(fingerprint.to_string()),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn decision_name(decision: &Decision) -> &'static str {
    match decision {
        Decision::NoAction => "no-action",
        Decision::DeleteNow => "delete",
        Decision::RequeueAfter(_) => "requeue-after",
    }
}
