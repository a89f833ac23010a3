//! Render stored runs as Markdown, JSON or CSV.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::models::{ResearchPayload, ResearchSummary};

pub const CSV_HEADER: &str = "id,text,platform,author,sentiment,timestamp,keywords";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!(
                "Unknown export format: {} (expected markdown, json or csv)",
                other
            )),
        }
    }
}

/// Render a run in `format`. CSV needs the payload; the others fall back
/// to what the summary alone can show.
pub fn export_run(
    format: ExportFormat,
    summary: &ResearchSummary,
    payload: Option<&ResearchPayload>,
) -> Result<String, String> {
    match format {
        ExportFormat::Markdown => Ok(to_markdown(summary, payload)),
        ExportFormat::Json => to_json(summary, payload),
        ExportFormat::Csv => match payload {
            Some(payload) => to_csv(payload),
            None => Err("Run has no payload to export as CSV".to_string()),
        },
    }
}

fn bullet_section(out: &mut String, title: &str, lines: &[String]) {
    let _ = writeln!(out, "## {}\n", title);
    if lines.is_empty() {
        out.push_str("_None._\n");
    }
    for line in lines {
        let _ = writeln!(out, "- {}", line);
    }
    out.push('\n');
}

// Pipes would break the table row
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn to_markdown(summary: &ResearchSummary, payload: Option<&ResearchPayload>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Research: {}\n", summary.topic);
    let _ = writeln!(
        out,
        "_Run {} · {} · confidence: {}_\n",
        summary.run_id,
        summary.created_at.format("%Y-%m-%d %H:%M UTC"),
        summary.confidence.as_str()
    );
    let _ = writeln!(out, "{}\n", summary.summary_text);

    bullet_section(&mut out, "Top pain points", &summary.top_pain_points);
    bullet_section(&mut out, "Product hypotheses", &summary.product_hypotheses);
    bullet_section(&mut out, "Recommended actions", &summary.recommended_actions);
    bullet_section(&mut out, "Sources", &summary.top_sources);

    if let Some(payload) = payload {
        if !payload.clusters.is_empty() {
            out.push_str("## Clusters\n\n");
            out.push_str("| # | Representative | Count | Share | Avg engagement | Tags |\n");
            out.push_str("|---|---|---|---|---|---|\n");
            for cluster in &payload.clusters {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {:.0}% | {:.2} | {} |",
                    cluster.cluster_id,
                    table_cell(&cluster.representative_text),
                    cluster.count,
                    cluster.percent_of_total * 100.0,
                    cluster.avg_engagement,
                    cluster.tags.join(", ")
                );
            }
            out.push('\n');
        }
    }

    out
}

pub fn to_json(
    summary: &ResearchSummary,
    payload: Option<&ResearchPayload>,
) -> Result<String, String> {
    let value = serde_json::json!({
        "summary": summary,
        "payload": payload,
    });
    serde_json::to_string_pretty(&value).map_err(|e| format!("Failed to serialize run: {}", e))
}

pub fn to_csv(payload: &ResearchPayload) -> Result<String, String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER.split(','))
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;
    for item in &payload.items {
        writer
            .write_record([
                item.id.clone(),
                item.text.clone(),
                item.platform.clone(),
                item.author.clone(),
                item.sentiment.compound.to_string(),
                item.timestamp.clone(),
                item.keywords.join("; "),
            ])
            .map_err(|e| format!("Failed to write CSV row: {}", e))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| format!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("CSV output is not UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawItem, ResearchRequest};
    use crate::pipeline::{LitePipeline, PipelineParams, ResearchPipeline};

    fn sample_run() -> (ResearchPayload, ResearchSummary) {
        let items = vec![
            RawItem {
                url: Some("https://reddit.com/r/x/1".to_string()),
                score: Some(5.0),
                ..RawItem::from_text("Sync keeps failing, \"again\"")
            },
            RawItem::from_text("The | pricing page is confusing"),
        ];
        LitePipeline::lite(PipelineParams::default())
            .process("run-x", &ResearchRequest::new("note app"), &items)
            .unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_markdown_sections() {
        let (payload, summary) = sample_run();
        let md = to_markdown(&summary, Some(&payload));
        assert!(md.starts_with("# Research: note app"));
        assert!(md.contains("## Top pain points"));
        assert!(md.contains("- https://reddit.com/r/x/1"));
        assert!(md.contains("## Clusters"));
        assert!(md.contains("The \\| pricing page"));
    }

    #[test]
    fn test_markdown_without_payload() {
        let (_, summary) = sample_run();
        let md = to_markdown(&summary, None);
        assert!(!md.contains("## Clusters"));
    }

    #[test]
    fn test_csv_quoting() {
        let (payload, _) = sample_run();
        let csv = to_csv(&payload).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), payload.items.len() + 2);
        assert!(csv.contains("\"Sync keeps failing, \"\"again\"\"\""));
    }

    #[test]
    fn test_csv_multiline_text_stays_one_record() {
        let (mut payload, _) = sample_run();
        payload.items[0].text = "first line\nsecond line".to_string();
        payload.items[0].keywords = vec!["sync".to_string(), "failing".to_string()];
        let csv = to_csv(&payload).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), payload.items.len());
        assert_eq!(&rows[0][1], "first line\nsecond line");
        assert_eq!(&rows[0][6], "sync; failing");
    }

    #[test]
    fn test_export_csv_requires_payload() {
        let (_, summary) = sample_run();
        assert!(export_run(ExportFormat::Csv, &summary, None).is_err());
        let json = export_run(ExportFormat::Json, &summary, None).unwrap();
        assert!(json.contains("\"payload\": null"));
    }
}
