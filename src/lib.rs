pub mod correlate;
pub mod money;
pub mod rates;
pub mod report;
pub mod tax;
pub mod tracker;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Warsaw;
use chrono_tz::Tz;
use csv::DeserializeRecordsIntoIter;
use dateparser::parse;
use decimal::d128;
use futures::Stream;
use money::Money;
use serde::{de, Deserialize};
use std::fmt;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Statement row types as exported by Coinbase Pro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionType {
    Match,
    Fee,
    Deposit,
    Withdrawal,
    Unknown(String),
}

impl From<&str> for TransactionType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "match" => Self::Match,
            "fee" => Self::Fee,
            "deposit" => Self::Deposit,
            "withdrawal" => Self::Withdrawal,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => f.write_str("match"),
            Self::Fee => f.write_str("fee"),
            Self::Deposit => f.write_str("deposit"),
            Self::Withdrawal => f.write_str("withdrawal"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TransactionRecord {
    portfolio: Option<String>,
    #[serde(rename = "type", deserialize_with = "deserialize_transaction_type")]
    kind: TransactionType,
    #[serde(deserialize_with = "deserialize_warsaw_time")]
    time: DateTime<Tz>,
    #[serde(rename = "trade id")]
    trade_id: Option<String>,
    #[serde(deserialize_with = "money::deserialize_amount")]
    amount: d128,
    #[serde(rename = "amount/balance unit")]
    unit: String,
}

impl TransactionRecord {
    pub fn new(
        portfolio: Option<&str>,
        kind: TransactionType,
        time: DateTime<Tz>,
        trade_id: Option<&str>,
        amount: d128,
        unit: &str,
    ) -> Self {
        Self {
            portfolio: portfolio.map(str::to_string),
            kind,
            time,
            trade_id: trade_id.map(str::to_string),
            amount,
            unit: unit.to_string(),
        }
    }

    pub fn portfolio(&self) -> Option<&str> {
        self.portfolio.as_deref()
    }

    pub fn kind(&self) -> &TransactionType {
        &self.kind
    }

    pub fn time(&self) -> &DateTime<Tz> {
        &self.time
    }

    pub fn trade_id(&self) -> Option<&str> {
        self.trade_id.as_deref()
    }

    /// The signed amount tagged with its currency.
    pub fn money(&self) -> Money {
        Money::with_currency(self.amount, &self.unit)
    }
}

fn deserialize_transaction_type<'de, D>(deserializer: D) -> Result<TransactionType, D::Error>
where
    D: de::Deserializer<'de>,
{
    let s: &str = de::Deserialize::deserialize(deserializer)?;
    Ok(TransactionType::from(s))
}

fn deserialize_warsaw_time<'de, D>(deserializer: D) -> Result<DateTime<Tz>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let s: &str = de::Deserialize::deserialize(deserializer)?;
    let dt = match local_time_parse(s) {
        Ok(dt) => dt,
        Err(parse_err) => {
            let dt = parse(s)
                .map_err(|e| de::Error::custom(format!("error: {} error: {}", parse_err, e)))?;
            dt.with_timezone(&Warsaw)
        }
    };
    Ok(dt)
}

/// Statement timestamps without an offset are UTC.
fn local_time_parse(s: &str) -> Result<DateTime<Tz>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")?;
    Ok(Utc.from_utc_datetime(&naive).with_timezone(&Warsaw))
}

/// Statement rows in file order.
pub struct RecordStream<R> {
    records: DeserializeRecordsIntoIter<R, TransactionRecord>,
}

impl<R: Read> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize();
        Self { records }
    }
}

impl<R: Read + Unpin> Stream for RecordStream<R> {
    type Item = anyhow::Result<TransactionRecord>;

    fn poll_next(mut self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = self
            .as_mut()
            .records
            .next()
            .map(|res| res.map_err(|e| anyhow!("{}", e)));
        Poll::Ready(next)
    }
}
