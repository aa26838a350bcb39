use crate::correlate::{build_rows, dedup_by_merge_id, ReportRow};
use crate::tracker::{DateWindow, WorkTracker};
use anyhow::{anyhow, Context};
use chrono_tz::Europe::Warsaw;
use log::{error, info};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 9] = [
    "PR Id",
    "Task Id",
    "Task title",
    "PR title",
    "Merged Date",
    "Days",
    "IsRND",
    "URL",
    "Project",
];

const MERGED_DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub year: i32,
    pub from_month: u32,
    pub to_month: u32,
    pub projects: Vec<String>,
    pub output_dir: PathBuf,
}

impl ReportConfig {
    pub fn new(
        year: i32,
        from_month: u32,
        to_month: u32,
        projects: Vec<String>,
        output_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        if !(1..=12).contains(&from_month) || !(1..=12).contains(&to_month) {
            return Err(anyhow!(
                "months must be between 1 and 12, got {}..{}",
                from_month,
                to_month
            ));
        }
        if from_month > to_month {
            return Err(anyhow!(
                "from month {} is after to month {}",
                from_month,
                to_month
            ));
        }
        if projects.is_empty() {
            return Err(anyhow!("at least one project is required"));
        }

        Ok(Self {
            year,
            from_month,
            to_month,
            projects,
            output_dir,
        })
    }

    pub fn month_sheet(&self, month: u32) -> String {
        format!("{}-{}", self.year, month)
    }

    pub fn total_sheet(&self) -> String {
        format!("{}-all", self.year)
    }
}

/// Destination for report sheets.
pub trait ReportSink {
    /// True when the sheet exists and the first cell of its first data row
    /// is filled.
    fn has_data(&self, sheet: &str) -> anyhow::Result<bool>;

    fn write_sheet(&mut self, sheet: &str, rows: &[ReportRow]) -> anyhow::Result<()>;
}

/// Writes every sheet as `<dir>/<sheet>.csv`.
#[derive(Debug)]
pub struct CsvReportDir {
    dir: PathBuf,
}

impl CsvReportDir {
    pub fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create report dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }
}

impl ReportSink for CsvReportDir {
    fn has_data(&self, sheet: &str) -> anyhow::Result<bool> {
        let path = self.sheet_path(sheet);
        if !path.exists() {
            return Ok(false);
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        match rdr.records().next() {
            Some(record) => Ok(record?.get(0).map_or(false, |v| !v.is_empty())),
            None => Ok(false),
        }
    }

    fn write_sheet(&mut self, sheet: &str, rows: &[ReportRow]) -> anyhow::Result<()> {
        let path = self.sheet_path(sheet);
        let mut wtr = csv::Writer::from_writer(File::create(&path)?);
        wtr.write_record(HEADER)?;
        for row in rows {
            let merged = row
                .closed_date
                .with_timezone(&Warsaw)
                .naive_local()
                .format(MERGED_DATE_FMT)
                .to_string();
            wtr.write_record(&[
                row.merge_id.as_str(),
                row.work_item_id.as_str(),
                row.work_item_title.as_str(),
                row.pr_title.as_str(),
                merged.as_str(),
                "0",
                "0",
                row.url.as_str(),
                row.project.as_str(),
            ])?;
        }
        wtr.flush()?;
        info!("wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ReportOutcome {
    pub written: Vec<u32>,
    pub skipped: Vec<u32>,
    pub failed: Vec<u32>,
    pub total_rows: usize,
}

fn collect_month<T: WorkTracker>(
    config: &ReportConfig,
    tracker: &T,
    month: u32,
) -> anyhow::Result<Vec<ReportRow>> {
    let window = DateWindow::month(config.year, month)?;
    info!("processing date range: {}", window);

    let mut rows = Vec::new();
    for project in &config.projects {
        info!("> project: {}", project);
        let mut prs = tracker.pull_requests(&window, project)?;
        let work_items = tracker.work_items(&prs, &window, project)?;
        info!(
            ">  found {} PRs and {} work items",
            prs.len(),
            work_items.len()
        );

        rows.extend(build_rows(&work_items, &mut prs, project));
    }

    Ok(dedup_by_merge_id(rows))
}

/// Writes one sheet per month of the configured range plus the yearly
/// aggregate. A failing month is logged and left out of both.
pub fn run_report<T: WorkTracker, S: ReportSink>(
    config: &ReportConfig,
    tracker: &T,
    sink: &mut S,
) -> anyhow::Result<ReportOutcome> {
    let mut outcome = ReportOutcome::default();
    let mut total = Vec::new();

    for month in config.from_month..=config.to_month {
        let sheet = config.month_sheet(month);
        if sink.has_data(&sheet)? {
            info!("Sheet for month {} already has values. Skipping", month);
            outcome.skipped.push(month);
            continue;
        }

        let written = collect_month(config, tracker, month)
            .and_then(|rows| sink.write_sheet(&sheet, &rows).map(|()| rows));
        match written {
            Ok(rows) => {
                info!("Created {}", month);
                total.extend(rows);
                outcome.written.push(month);
            }
            Err(e) => {
                error!("Failed on month {}: {:?}", month, e);
                outcome.failed.push(month);
            }
        }
    }

    sink.write_sheet(&config.total_sheet(), &total)?;
    outcome.total_rows = total.len();
    Ok(outcome)
}
