use crate::tracker::{PullRequestRecord, WorkItemRecord};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use std::collections::HashSet;

/// One line of a report sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Empty for work items without a pull request.
    pub merge_id: String,
    pub work_item_id: String,
    pub work_item_title: String,
    pub pr_title: String,
    pub closed_date: DateTime<Utc>,
    pub url: String,
    pub project: String,
}

/// Drops every `fix` / `fix:` token, ignoring case.
pub fn obfuscate(title: &str) -> String {
    lazy_static! {
        static ref FIX: Regex = Regex::new(r"(?i)fix:?").unwrap();
    }

    FIX.replace_all(title, "")
        .trim()
        .trim_matches(':')
        .trim()
        .to_string()
}

/// Pull request rows in merge order followed by work items no pull request
/// points at.
pub fn build_rows<'a>(
    work_items: &'a [WorkItemRecord],
    prs: &'a mut [PullRequestRecord],
    project: &'a str,
) -> impl Iterator<Item = ReportRow> + 'a {
    prs.sort_by_key(|pr| pr.closed_date);
    let prs: &'a [PullRequestRecord] = prs;

    let pr_rows = prs.iter().map(move |pr| pr_row(pr, work_items));
    let orphans = work_items
        .iter()
        .filter(move |wi| !prs.iter().any(|pr| pr.references(&wi.id)))
        .map(move |wi| {
            info!("task without PR: {} {}", wi.title, wi.id);
            ReportRow {
                merge_id: String::new(),
                work_item_id: wi.id.clone(),
                work_item_title: wi.title.clone(),
                pr_title: String::new(),
                closed_date: wi.closed_date,
                url: wi.url.clone(),
                project: project.to_string(),
            }
        });

    pr_rows.chain(orphans)
}

fn pr_row(pr: &PullRequestRecord, work_items: &[WorkItemRecord]) -> ReportRow {
    let linked: Vec<&WorkItemRecord> = work_items
        .iter()
        .filter(|wi| pr.references(&wi.id))
        .collect();

    let (id, title) = match linked.first() {
        Some(first) => (
            first.id.clone(),
            linked
                .iter()
                .map(|wi| wi.title.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        ),
        None => {
            if !pr.work_item_refs.is_empty() {
                warn!("{} has work items but could not find title", pr.id);
            }
            (String::new(), String::new())
        }
    };
    info!("task: {} pr: {}", title, pr.title);

    ReportRow {
        merge_id: pr.merge_id.clone(),
        work_item_id: id,
        work_item_title: obfuscate(&title),
        pr_title: obfuscate(&pr.title),
        closed_date: pr.closed_date,
        url: pr.url.clone(),
        project: pr.repository.clone(),
    }
}

/// Keeps the first row of every merge id. Rows without a merge id are all
/// kept.
pub fn dedup_by_merge_id<I: IntoIterator<Item = ReportRow>>(rows: I) -> Vec<ReportRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| row.merge_id.is_empty() || seen.insert(row.merge_id.clone()))
        .collect()
}
