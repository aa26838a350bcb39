use crate::money::Money;
use crate::{RecordStream, TransactionRecord, TransactionType};
use chrono::DateTime;
use chrono_tz::Tz;
use futures::stream::Stream;
use futures::{pin_mut, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::fs::File;
use std::path::Path;

pub const COINBASE_PRO: &str = "Coinbase PRO";

/// Converts an amount to the local currency as of a point in time.
pub trait RateConverter {
    fn convert(&self, money: &Money, at: &DateTime<Tz>) -> anyhow::Result<Money>;
}

#[non_exhaustive]
pub enum TaxError {
    UnknownType { kind: String },
    PositiveFee { trade_id: Option<String> },
}

impl fmt::Debug for TaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { kind } => {
                write!(f, "{}. Unknown transaction type {}", COINBASE_PRO, kind)
            }
            Self::PositiveFee { trade_id } => write!(
                f,
                "Positive fee for trade_id: {}",
                trade_id.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

impl fmt::Display for TaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for TaxError {}

#[derive(Clone, Debug, PartialEq)]
pub struct TaxTotals {
    /// Fiat received from sales.
    pub income: Money,
    /// Fiat spent on purchases and fees.
    pub cost: Money,
    /// Never populated from the statement.
    pub staking: Money,
}

impl Default for TaxTotals {
    fn default() -> Self {
        Self {
            income: Money::local_zero(),
            cost: Money::local_zero(),
            staking: Money::local_zero(),
        }
    }
}

impl TaxTotals {
    fn apply<C: RateConverter>(
        &mut self,
        record: &TransactionRecord,
        rates: &C,
    ) -> anyhow::Result<()> {
        if record.portfolio().is_none() {
            return Ok(());
        }

        match record.kind() {
            TransactionType::Deposit | TransactionType::Withdrawal => return Ok(()),
            TransactionType::Unknown(kind) => {
                return Err(TaxError::UnknownType { kind: kind.clone() }.into())
            }
            TransactionType::Match | TransactionType::Fee => {}
        }

        let money = record.money();
        if !money.is_fiat() {
            return Ok(());
        }

        if *record.kind() == TransactionType::Fee {
            if !money.is_negative() {
                return Err(TaxError::PositiveFee {
                    trade_id: record.trade_id().map(str::to_string),
                }
                .into());
            }
            let local = rates.convert(&money, record.time())?.round_to_cents();
            debug!("fee {} -> {}", money, local);
            self.cost.sub(&local)?;
        }

        if *record.kind() == TransactionType::Match {
            let local = rates.convert(&money, record.time())?.round_to_cents();
            debug!("match {} -> {}", money, local);
            if local.is_positive() {
                self.income.add(&local)?;
            } else {
                self.cost.sub(&local)?;
            }
        }

        Ok(())
    }
}

pub struct TaxCalculator<S: Stream<Item = anyhow::Result<TransactionRecord>>> {
    records: S,
}

impl<S: Stream<Item = anyhow::Result<TransactionRecord>>> TaxCalculator<S> {
    pub fn new(records: S) -> Self {
        Self { records }
    }

    /// Accumulates the whole stream; any failing record discards the totals.
    pub async fn totals<C: RateConverter>(self, rates: &C) -> anyhow::Result<TaxTotals> {
        let records = self.records;
        pin_mut!(records);

        let mut totals = TaxTotals::default();
        while let Some(record) = records.as_mut().next().await {
            totals.apply(&record?, rates)?;
        }

        Ok(totals)
    }
}

#[derive(Clone, Debug)]
pub struct TaxSummary {
    pub label: &'static str,
    /// `None` when the statement file does not exist.
    pub totals: Option<TaxTotals>,
}

pub async fn calculate_tax<P: AsRef<Path>, C: RateConverter>(
    statement: P,
    rates: &C,
) -> anyhow::Result<TaxSummary> {
    let statement = statement.as_ref();
    if !statement.exists() {
        warn!(
            "{} {} doesnt exist. Skipping",
            COINBASE_PRO,
            statement.display()
        );
        return Ok(TaxSummary {
            label: COINBASE_PRO,
            totals: None,
        });
    }

    let file = File::open(statement)?;
    let totals = TaxCalculator::new(RecordStream::new(file))
        .totals(rates)
        .await?;
    info!(
        "{}: income {} cost {}",
        COINBASE_PRO, totals.income, totals.cost
    );

    Ok(TaxSummary {
        label: COINBASE_PRO,
        totals: Some(totals),
    })
}
