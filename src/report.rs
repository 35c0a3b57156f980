use crate::checker::Checker;
use crate::error::Result;
use crate::types::{BoardManifest, BoardReport, CheckResult, DistfileReport, StatusReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Totals printed at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub boards: usize,
    pub urls: usize,
    pub available: usize,
}

impl Summary {
    pub fn of(report: &StatusReport) -> Self {
        let results = report
            .boards
            .values()
            .flat_map(|b| b.distfiles.iter())
            .flat_map(|d| d.urls.iter());

        let mut summary = Summary {
            boards: report.boards.len(),
            ..Default::default()
        };
        for result in results {
            summary.urls += 1;
            if result.available() {
                summary.available += 1;
            }
        }
        summary
    }
}

/// Check every distfile URL of every manifest and group the results by board.
///
/// Manifests that share a board directory are merged into one entry. A
/// malformed mirror reference aborts the run.
pub async fn generate(checker: &Checker, manifests: &[BoardManifest]) -> Result<StatusReport> {
    let total: usize = manifests
        .iter()
        .flat_map(|m| m.distfiles.iter())
        .map(|d| d.urls.len())
        .sum();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("|| "),
    );

    generate_with(checker, manifests, &pb).await
}

async fn generate_with(
    checker: &Checker,
    manifests: &[BoardManifest],
    pb: &ProgressBar,
) -> Result<StatusReport> {
    let boards = check_boards(checker, manifests, pb).await;
    // Cleared on error too, or the bar is left on the terminal.
    pb.finish_and_clear();

    Ok(StatusReport {
        generated_at: chrono::Utc::now(),
        boards: boards?,
    })
}

async fn check_boards(
    checker: &Checker,
    manifests: &[BoardManifest],
    pb: &ProgressBar,
) -> Result<BTreeMap<String, BoardReport>> {
    let mut boards: BTreeMap<String, BoardReport> = BTreeMap::new();

    for manifest in manifests {
        info!("[BOARD] {} ({})", manifest.board, manifest.path.display());
        let board = boards.entry(manifest.board.clone()).or_default();

        for distfile in &manifest.distfiles {
            info!("  [DISTFILE] {}", distfile.name);
            pb.set_message(distfile.name.clone());

            let checked = checker.check_all(&distfile.urls).await;
            let mut urls: Vec<CheckResult> = Vec::with_capacity(checked.len());
            for (url, result) in distfile.urls.iter().zip(checked) {
                let result = result?;
                let status = if result.available() { "OK" } else { "FAIL" };
                info!("    [CHECK] {} ({}) -> {}", url, result.kind(), status);
                pb.inc(1);
                urls.push(result);
            }

            board.distfiles.push(DistfileReport {
                name: distfile.name.clone(),
                urls,
            });
        }
    }

    Ok(boards)
}

/// Write the report as pretty-printed JSON.
pub async fn write_report(report: &StatusReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).await?;
    Ok(())
}
