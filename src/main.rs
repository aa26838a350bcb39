use clap::{Parser, Subcommand};
use ipbox_tax_report::rates::RateTable;
use ipbox_tax_report::report::{run_report, CsvReportDir, ReportConfig};
use ipbox_tax_report::tax::calculate_tax;
use ipbox_tax_report::tracker::CsvTracker;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Income and cost totals from a Coinbase Pro account statement
    Tax {
        #[clap(long, default_value = "coinbase_pro.csv")]
        statement: PathBuf,
        /// CSV with `date,currency,rate` rows
        #[clap(long)]
        rates: PathBuf,
    },
    /// Monthly sheets of merged pull requests and closed work items
    Report {
        #[clap(long)]
        year: i32,
        #[clap(long)]
        from_month: u32,
        #[clap(long)]
        to_month: u32,
        #[clap(long = "project", required = true)]
        projects: Vec<String>,
        /// Directory holding pull_requests.csv and work_items.csv
        #[clap(long)]
        tracker: PathBuf,
        #[clap(long, default_value = "report")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Tax { statement, rates } => {
            let rates = RateTable::from_path(rates)?;
            let summary = calculate_tax(statement, &rates).await?;
            match summary.totals {
                Some(totals) => println!(
                    "{}: income {} cost {} staking {}",
                    summary.label, totals.income, totals.cost, totals.staking
                ),
                None => println!("{}: no data", summary.label),
            }
        }
        Command::Report {
            year,
            from_month,
            to_month,
            projects,
            tracker,
            output,
        } => {
            let config = ReportConfig::new(year, from_month, to_month, projects, output)?;
            let tracker = CsvTracker::open(tracker)?;
            let mut sink = CsvReportDir::new(&config.output_dir)?;
            let outcome = run_report(&config, &tracker, &mut sink)?;
            println!("{:#?}", outcome);
        }
    }

    Ok(())
}
