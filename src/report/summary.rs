//! Markdown summary generation
//!
//! Renders a [`CrawlReport`] as a human-readable markdown file: session
//! metadata, the artifact listing, and any failed targets.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::report::{CrawlReport, SinkError};

/// Renders a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Satchel Crawl Summary\n\n");

    md.push_str("## Session\n\n");
    md.push_str(&format!("- **Session ID**: {}\n", report.session_id));
    md.push_str(&format!("- **Root**: {}\n", report.root_id));
    md.push_str(&format!("- **Status**: {}\n", report.completion));
    md.push_str(&format!("- **Pages Visited**: {}\n", report.pages_visited));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n",
        report.duration_ms as f64 / 1000.0
    ));
    md.push_str(&format!("- **Artifacts**: {}\n\n", report.artifacts.len()));

    md.push_str("## Discovered Artifacts\n\n");
    if report.artifacts.is_empty() {
        md.push_str("No artifacts were discovered.\n\n");
    } else {
        md.push_str("| Title | Location | Source | Confidence |\n");
        md.push_str("|-------|----------|--------|------------|\n");
        for artifact in &report.artifacts {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2} |\n",
                escape_cell(&artifact.title),
                escape_cell(&artifact.location),
                artifact.source,
                artifact.confidence
            ));
        }
        md.push('\n');
    }

    if !report.failed_targets.is_empty() {
        md.push_str("## Failed Targets\n\n");
        md.push_str("| Target | Error | At |\n");
        md.push_str("|--------|-------|----|\n");
        for failure in &report.failed_targets {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                escape_cell(&failure.target),
                escape_cell(&failure.message),
                failure.at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n");
    md.push_str("*Generated by satchel*\n");

    md
}

/// Writes the markdown summary to a file
///
/// # Arguments
///
/// * `report` - The crawl report to render
/// * `output_path` - Path the markdown file is written to
pub fn write_markdown_summary(report: &CrawlReport, output_path: &Path) -> Result<(), SinkError> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Escapes pipe characters so cell content cannot break the table
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
