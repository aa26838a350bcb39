use ipbox_tax_report::correlate::ReportRow;
use ipbox_tax_report::report::{run_report, CsvReportDir, ReportConfig, ReportSink, HEADER};
use ipbox_tax_report::tracker::{
    CsvTracker, DateWindow, PullRequestRecord, WorkItemRecord, WorkTracker,
};
use std::fs;
use std::path::Path;

fn config(out: &Path) -> ReportConfig {
    ReportConfig::new(
        2021,
        1,
        3,
        vec!["Shop".to_string(), "Bank".to_string()],
        out.to_path_buf(),
    )
    .unwrap()
}

fn read_sheet(sink: &CsvReportDir, sheet: &str) -> Vec<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(sink.sheet_path(sheet))
        .unwrap();
    rdr.records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn writes_monthly_and_total_sheets() {
    let _ = env_logger::builder().is_test(true).try_init();
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let tracker = CsvTracker::open("./testdata/tracker").unwrap();
    let mut sink = CsvReportDir::new(out.path()).unwrap();

    let outcome = run_report(&config, &tracker, &mut sink).unwrap();
    assert_eq!(outcome.written, vec![1, 2, 3]);
    assert!(outcome.skipped.is_empty());
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.total_rows, 5);

    let january = read_sheet(&sink, "2021-1");
    assert_eq!(january[0], HEADER.to_vec());
    assert_eq!(
        january[1],
        vec![
            "m2",
            "101",
            "Cart;  totals",
            "Cart totals",
            "2021-01-05 11:00:00",
            "0",
            "0",
            "http://pr/2",
            "web"
        ]
    );
    assert_eq!(january[2][0], "m1");
    assert_eq!(january[2][3], "login form");
    // orphan of the first project comes before the second project's rows
    assert_eq!(january[3][..3], ["", "103", "Spike"]);
    assert_eq!(january[3][8], "Shop");
    assert_eq!(january[4][0], "m3");
    assert_eq!(january[4][8], "core");

    let february = read_sheet(&sink, "2021-2");
    assert_eq!(february.len(), 1);
    assert!(!sink.has_data("2021-2").unwrap());

    let march = read_sheet(&sink, "2021-3");
    assert_eq!(march[1][..3], ["m4", "", ""]);

    let total = read_sheet(&sink, "2021-all");
    assert_eq!(total.len(), 6);
    assert!(sink.has_data("2021-all").unwrap());
}

#[test]
fn populated_month_is_skipped() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let tracker = CsvTracker::open("./testdata/tracker").unwrap();
    let mut sink = CsvReportDir::new(out.path()).unwrap();
    fs::write(
        sink.sheet_path("2021-1"),
        "PR Id,Task Id\nkept,by hand\n",
    )
    .unwrap();

    let outcome = run_report(&config, &tracker, &mut sink).unwrap();
    assert_eq!(outcome.skipped, vec![1]);
    assert_eq!(outcome.written, vec![2, 3]);
    assert_eq!(outcome.total_rows, 1);

    let january = fs::read_to_string(sink.sheet_path("2021-1")).unwrap();
    assert_eq!(january, "PR Id,Task Id\nkept,by hand\n");
}

/// Fails every call made for February.
struct FlakyTracker {
    inner: CsvTracker,
    broken: DateWindow,
}

impl WorkTracker for FlakyTracker {
    fn pull_requests(
        &self,
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<PullRequestRecord>> {
        if *window == self.broken {
            anyhow::bail!("tracker unavailable");
        }
        self.inner.pull_requests(window, project)
    }

    fn work_items(
        &self,
        prs: &[PullRequestRecord],
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<WorkItemRecord>> {
        self.inner.work_items(prs, window, project)
    }
}

#[test]
fn failing_month_does_not_stop_the_run() {
    let out = tempfile::tempdir().unwrap();
    let config = ReportConfig::new(
        2021,
        1,
        3,
        vec!["Shop".to_string()],
        out.path().to_path_buf(),
    )
    .unwrap();
    let tracker = FlakyTracker {
        inner: CsvTracker::open("./testdata/tracker").unwrap(),
        broken: DateWindow::month(2021, 2).unwrap(),
    };
    let mut sink = CsvReportDir::new(out.path()).unwrap();

    let outcome = run_report(&config, &tracker, &mut sink).unwrap();
    assert_eq!(outcome.written, vec![1, 3]);
    assert_eq!(outcome.failed, vec![2]);
    assert!(!sink.sheet_path("2021-2").exists());
    // January: m2, m1, orphan 103. March: m4.
    assert_eq!(outcome.total_rows, 4);
    assert_eq!(read_sheet(&sink, "2021-all").len(), 5);
}

/// Accepts every sheet except one.
struct ReadOnlySheet {
    inner: CsvReportDir,
    locked: String,
}

impl ReportSink for ReadOnlySheet {
    fn has_data(&self, sheet: &str) -> anyhow::Result<bool> {
        self.inner.has_data(sheet)
    }

    fn write_sheet(&mut self, sheet: &str, rows: &[ReportRow]) -> anyhow::Result<()> {
        if sheet == self.locked {
            anyhow::bail!("{} is locked", sheet);
        }
        self.inner.write_sheet(sheet, rows)
    }
}

#[test]
fn unwritten_month_is_left_out_of_total() {
    let out = tempfile::tempdir().unwrap();
    let config = ReportConfig::new(
        2021,
        1,
        3,
        vec!["Shop".to_string()],
        out.path().to_path_buf(),
    )
    .unwrap();
    let tracker = CsvTracker::open("./testdata/tracker").unwrap();
    let mut sink = ReadOnlySheet {
        inner: CsvReportDir::new(out.path()).unwrap(),
        locked: "2021-1".to_string(),
    };

    let outcome = run_report(&config, &tracker, &mut sink).unwrap();
    assert_eq!(outcome.failed, vec![1]);
    assert_eq!(outcome.written, vec![2, 3]);
    assert_eq!(outcome.total_rows, 1);

    let total = read_sheet(&sink.inner, "2021-all");
    assert_eq!(total.len(), 2);
    assert_eq!(total[1][0], "m4");
}

#[test]
fn sheet_starting_with_orphan_row_is_regenerated() {
    let out = tempfile::tempdir().unwrap();
    let config = config(out.path());
    let tracker = CsvTracker::open("./testdata/tracker").unwrap();
    let mut sink = CsvReportDir::new(out.path()).unwrap();
    fs::write(
        sink.sheet_path("2021-1"),
        "PR Id,Task Id,Task title\n,103,Spike\n",
    )
    .unwrap();
    assert!(!sink.has_data("2021-1").unwrap());

    let outcome = run_report(&config, &tracker, &mut sink).unwrap();
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.written, vec![1, 2, 3]);
    assert_eq!(read_sheet(&sink, "2021-1")[1][0], "m2");
}
