use crate::common::fast_reveal;
use backscroll::collector::MetricsRowExtractor;
use backscroll::config::{Config, MetricsConfig};
use backscroll::driver::{HtmlSnapshotDriver, RevealSelectors};
use backscroll::output::TableWriter;
use backscroll::session::NoSession;
use backscroll::{CrashSafePersister, Harvest, RecordKind, TerminationDecision};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn metrics_config() -> MetricsConfig {
    MetricsConfig {
        table: "table.metrics".to_string(),
        cell_value: Some("span.value".to_string()),
        expected_cells: 3,
        next_button: "div.paging button".to_string(),
        ..Config::default().metrics
    }
}

fn metrics_page(rows: &[&[&str]], next_enabled: bool) -> String {
    let mut html = String::from(
        r#"<html><body><table class="metrics"><tr><th>Bot</th><th>Date</th><th>Earnings</th></tr>"#,
    );
    for row in rows {
        html.push_str("<tr>");
        for cell in *row {
            html.push_str(&format!(r#"<td><span class="value">{}</span><span>detail</span></td>"#, cell));
        }
        html.push_str("</tr>");
    }
    let disabled = if next_enabled { "" } else { " disabled" };
    html.push_str(&format!(
        r#"</table><div class="paging"><button>Prev</button><button{}>Next</button></div></body></html>"#,
        disabled
    ));
    html
}

#[tokio::test]
async fn test_metrics_pages_are_exported_as_csv() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("reports").join("earnings.csv");
    let mut driver = HtmlSnapshotDriver::new(
        vec![
            metrics_page(
                &[&["Helper", "2024-03-01", "$1.00"], &["Writer, Pro", "2024-03-01", "$2.50"]],
                true,
            ),
            metrics_page(&[&["Coder", "2024-03-02", "$0.10"], &["Solo", "2024-03-02"]], false),
        ],
        RevealSelectors::pagination(&metrics_config().next_button),
    );
    let mut extractor = MetricsRowExtractor::new(&metrics_config());
    let persister = CrashSafePersister::new(Box::new(TableWriter::new()), &output);

    let report = Harvest::new("https://poe.com/creators", fast_reveal(5))
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.kind, RecordKind::MetricsRow);
    assert_eq!(report.reason, TerminationDecision::StopNoMoreTrigger);
    assert_eq!(report.saved, 4);
    assert_eq!(report.destination.as_deref(), Some(output.as_path()));
    assert_eq!(driver.trigger_count(), 1);

    let csv = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        csv,
        "Bot,Date,Earnings\n\
         Helper,2024-03-01,$1.00\n\
         \"Writer, Pro\",2024-03-01,$2.50\n\
         Coder,2024-03-02,$0.10\n\
         Solo,2024-03-02,\n"
    );
}

#[tokio::test]
async fn test_revisited_page_adds_no_rows() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("earnings.csv");
    // The "next" button reloads the same page; rows are recognised by content
    let page = metrics_page(&[&["Helper", "2024-03-01", "$1.00"]], true);
    let mut driver = HtmlSnapshotDriver::new(
        vec![page.clone(), page],
        RevealSelectors::pagination(&metrics_config().next_button),
    );
    let mut extractor = MetricsRowExtractor::new(&metrics_config());
    let persister = CrashSafePersister::new(Box::new(TableWriter::new()), &output);

    let report = Harvest::new("https://poe.com/creators", fast_reveal(2))
        .run(
            &mut driver,
            &NoSession,
            &mut extractor,
            &persister,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.reason, TerminationDecision::StopNoNewContent);
    assert_eq!(report.saved, 1);
    assert_eq!(report.stats.iterations, 2);
    assert!(report.stats.duplicates_skipped >= 2);

    let csv = std::fs::read_to_string(&output).unwrap();
    assert_eq!(csv, "Bot,Date,Earnings\nHelper,2024-03-01,$1.00\n");
}
