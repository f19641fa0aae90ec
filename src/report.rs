//! Markdown rendering of the aggregated report.
//!
//! Fixed heading structure: three summary tables (support type, actions
//! usage, classification) followed by one subsection per repository.

use crate::models::{AggregatedReport, ScanReport};
use std::collections::BTreeMap;

/// Generate the complete Markdown rendering.
pub fn generate_markdown_report(aggregated: &AggregatedReport) -> String {
    let mut output = String::new();

    output.push_str("# NIM Scan Aggregated Report\n\n");
    output.push_str(&format!(
        "**Generated:** {}\n",
        aggregated.metadata.aggregation_time.to_rfc3339()
    ));
    output.push_str(&format!(
        "**Total Repositories:** {}\n\n",
        aggregated.metadata.total_repos
    ));

    output.push_str("## Summary Statistics\n\n");
    output.push_str(&generate_tally_table(
        "By Support Type",
        "Type",
        &aggregated.summary.by_support_type,
    ));
    output.push_str(&generate_tally_table(
        "By Actions Usage",
        "Usage",
        &aggregated.summary.by_actions_usage,
    ));
    output.push_str(&generate_tally_table(
        "By Classification",
        "Classification",
        &aggregated.summary.by_classification,
    ));

    output.push_str("## Repository Details\n\n");
    for report in &aggregated.repositories {
        output.push_str(&generate_repository_section(report));
    }

    output
}

/// Generate one tally table section. BTreeMap iteration keeps labels
/// sorted, which the classification table requires.
fn generate_tally_table(heading: &str, label: &str, tally: &BTreeMap<String, usize>) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", heading));
    section.push_str(&format!("| {} | Count |\n", label));
    section.push_str(&format!("|{}|-------|\n", "-".repeat(label.len() + 2)));

    for (key, count) in tally {
        section.push_str(&format!("| {} | {} |\n", key, count));
    }
    section.push('\n');

    section
}

/// Generate the per-repository detail subsection.
fn generate_repository_section(report: &ScanReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", report.repo_name()));
    section.push_str(&format!(
        "- **Classification:** {}\n",
        report.classification()
    ));
    section.push_str(&format!(
        "- **Description:** {}\n",
        report.classification_description()
    ));
    section.push_str(&format!(
        "- **Supports Local NIM:** {}\n",
        report.supports_local_nim()
    ));
    section.push_str(&format!(
        "- **Supports Hosted NIM:** {}\n",
        report.supports_hosted_nim()
    ));
    section.push_str(&format!(
        "- **Uses Local NIM in Actions:** {}\n",
        report.uses_local_nim_in_actions()
    ));
    section.push_str(&format!(
        "- **Uses Hosted NIM in Actions:** {}\n\n",
        report.uses_hosted_nim_in_actions()
    ));

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, LoadedReport};
    use chrono::Utc;
    use std::path::PathBuf;

    fn sample_aggregate() -> AggregatedReport {
        let report: ScanReport = serde_json::from_value(serde_json::json!({
            "classification": "LOCAL_READY",
            "classification_description": "Ships a local NIM container",
            "summary": {
                "supports_local_nim": true,
                "supports_hosted_nim": false,
                "uses_local_nim_in_actions": true,
                "uses_hosted_nim_in_actions": false
            },
            "metadata": { "repo_name": "acme/widgets" }
        }))
        .unwrap();

        let loaded = vec![LoadedReport {
            report,
            source_dir: PathBuf::from("reports/acme__widgets"),
            source_file: "nim-scan-report.json".to_string(),
        }];

        aggregate(&loaded, Utc::now())
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&sample_aggregate());

        assert!(markdown.contains("# NIM Scan Aggregated Report"));
        assert!(markdown.contains("## Summary Statistics"));
        assert!(markdown.contains("### By Support Type"));
        assert!(markdown.contains("### By Actions Usage"));
        assert!(markdown.contains("### By Classification"));
        assert!(markdown.contains("| local_only | 1 |"));
        assert!(markdown.contains("| local_in_actions | 1 |"));
        assert!(markdown.contains("### acme/widgets"));
        assert!(markdown.contains("- **Classification:** LOCAL_READY"));
        assert!(markdown.contains("- **Supports Local NIM:** true"));
    }

    #[test]
    fn test_classification_table_sorted_by_label() {
        let mut tally = BTreeMap::new();
        tally.insert("ZULU".to_string(), 1);
        tally.insert("ALPHA".to_string(), 2);

        let section = generate_tally_table("By Classification", "Classification", &tally);
        let alpha = section.find("ALPHA").unwrap();
        let zulu = section.find("ZULU").unwrap();
        assert!(alpha < zulu);
    }

    #[test]
    fn test_separator_row_matches_label_width() {
        let tally = BTreeMap::new();
        assert!(generate_tally_table("By Support Type", "Type", &tally)
            .contains("|------|-------|"));
        assert!(generate_tally_table("By Actions Usage", "Usage", &tally)
            .contains("|-------|-------|"));
        assert!(
            generate_tally_table("By Classification", "Classification", &tally)
                .contains("|----------------|-------|")
        );
    }

    #[test]
    fn test_empty_aggregate_renders() {
        let aggregated = aggregate(&[], Utc::now());
        let markdown = generate_markdown_report(&aggregated);

        assert!(markdown.contains("**Total Repositories:** 0"));
        assert!(markdown.contains("## Repository Details"));
    }
}
