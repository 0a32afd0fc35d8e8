use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gpulink_codegen::OutcomeSummary;
use gpulink_host::Message;
use gpulink_idl::MessageId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Totals reported after decoding a captured stream.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub messages: u64,
    pub dropped: u64,
    pub skipped_bytes: u64,
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(message)),
        OutputFormat::Table => {
            let mut table = table(vec!["ID", "MESSAGE", "FIELDS"]);
            table.add_row(vec![
                message.id.to_string(),
                message.name.clone(),
                json_line(&message.value),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} (id={}) {}",
                message.name,
                message.id,
                serde_json::to_string_pretty(&message.value).unwrap_or_default()
            );
        }
    }
}

pub fn print_ids(ids: &[MessageId], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(&ids)),
        OutputFormat::Table => {
            let mut table = table(vec!["ID", "MESSAGE", "FILE"]);
            for entry in ids {
                table.add_row(vec![
                    entry.id.to_string(),
                    entry.name.clone(),
                    entry.file.display().to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in ids {
                println!("{:>3}  {}  ({})", entry.id, entry.name, entry.file.display());
            }
        }
    }
}

pub fn print_outcomes(outcomes: &[OutcomeSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(&outcomes)),
        OutputFormat::Table => {
            let mut table = table(vec!["TARGET", "STATUS", "FILES", "ERROR"]);
            for outcome in outcomes {
                table.add_row(vec![
                    outcome.target.to_string(),
                    status(outcome.ok).to_string(),
                    outcome.files.len().to_string(),
                    outcome.error.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for outcome in outcomes {
                match &outcome.error {
                    Some(error) => println!("{}: {} ({error})", outcome.target, status(false)),
                    None => println!(
                        "{}: {} ({} files)",
                        outcome.target,
                        status(true),
                        outcome.files.len()
                    ),
                }
            }
        }
    }
}

pub fn print_decode_summary(summary: &DecodeSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(summary)),
        OutputFormat::Table => {
            let mut table = table(vec!["MESSAGES", "DROPPED", "SKIPPED BYTES"]);
            table.add_row(vec![
                summary.messages.to_string(),
                summary.dropped.to_string(),
                summary.skipped_bytes.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "messages={} dropped={} skipped_bytes={}",
            summary.messages, summary.dropped, summary.skipped_bytes
        ),
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "failed"
    }
}
