use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Europe::Warsaw;
use log::debug;
use serde::{de, Deserialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const PULL_REQUESTS_FILE: &str = "pull_requests.csv";
pub const WORK_ITEMS_FILE: &str = "work_items.csv";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PullRequestRecord {
    pub id: String,
    pub merge_id: String,
    pub title: String,
    pub closed_date: DateTime<Utc>,
    pub url: String,
    pub repository: String,
    pub project: String,
    #[serde(default, deserialize_with = "deserialize_refs")]
    pub work_item_refs: Vec<String>,
}

impl PullRequestRecord {
    pub fn references(&self, work_item_id: &str) -> bool {
        self.work_item_refs.iter().any(|r| r == work_item_id)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkItemRecord {
    pub id: String,
    pub title: String,
    pub closed_date: DateTime<Utc>,
    pub url: String,
    pub project: String,
}

/// `;` separated work item ids.
fn deserialize_refs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let s: &str = de::Deserialize::deserialize(deserializer)?;
    Ok(s.split(';')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect())
}

/// Inclusive time range covering one calendar month in Warsaw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn month(year: i32, month: u32) -> anyhow::Result<Self> {
        let start = month_start(year, month)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = month_start(next_year, next_month)? - Duration::seconds(1);
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start <= *at && *at <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.with_timezone(&Warsaw),
            self.end.with_timezone(&Warsaw)
        )
    }
}

fn month_start(year: i32, month: u32) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("invalid month {}-{}", year, month))?;
    let local = Warsaw
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow!("ambiguous month start {}", naive))?;
    Ok(local.with_timezone(&Utc))
}

/// Source of merged pull requests and closed work items.
pub trait WorkTracker {
    fn pull_requests(
        &self,
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<PullRequestRecord>>;

    fn work_items(
        &self,
        prs: &[PullRequestRecord],
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<WorkItemRecord>>;
}

/// Tracker backed by CSV exports of pull requests and work items.
#[derive(Debug, Default)]
pub struct CsvTracker {
    pull_requests: Vec<PullRequestRecord>,
    work_items: Vec<WorkItemRecord>,
}

impl CsvTracker {
    pub fn new(pull_requests: Vec<PullRequestRecord>, work_items: Vec<WorkItemRecord>) -> Self {
        Self {
            pull_requests,
            work_items,
        }
    }

    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let prs = File::open(dir.join(PULL_REQUESTS_FILE))
            .with_context(|| format!("cannot open {}", dir.join(PULL_REQUESTS_FILE).display()))?;
        let wis = File::open(dir.join(WORK_ITEMS_FILE))
            .with_context(|| format!("cannot open {}", dir.join(WORK_ITEMS_FILE).display()))?;

        Ok(Self::new(read_csv(prs)?, read_csv(wis)?))
    }
}

fn read_csv<R: Read, T: de::DeserializeOwned>(reader: R) -> anyhow::Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    for record in rdr.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

impl WorkTracker for CsvTracker {
    fn pull_requests(
        &self,
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<PullRequestRecord>> {
        Ok(self
            .pull_requests
            .iter()
            .filter(|pr| pr.project == project && window.contains(&pr.closed_date))
            .cloned()
            .collect())
    }

    fn work_items(
        &self,
        prs: &[PullRequestRecord],
        window: &DateWindow,
        project: &str,
    ) -> anyhow::Result<Vec<WorkItemRecord>> {
        let items: Vec<WorkItemRecord> = self
            .work_items
            .iter()
            .filter(|wi| wi.project == project && window.contains(&wi.closed_date))
            .cloned()
            .collect();

        let outside = prs
            .iter()
            .flat_map(|pr| pr.work_item_refs.iter())
            .filter(|r| !items.iter().any(|wi| &wi.id == *r))
            .count();
        if outside > 0 {
            debug!("{} referenced work items are outside {}", outside, window);
        }

        Ok(items)
    }
}
