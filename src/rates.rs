use crate::money::{self, Money, LOCAL_CURRENCY};
use crate::tax::RateConverter;
use anyhow::anyhow;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use decimal::d128;
use log::trace;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

#[derive(Deserialize, Debug)]
struct RateRow {
    date: NaiveDate,
    currency: String,
    #[serde(deserialize_with = "money::deserialize_amount")]
    rate: d128,
}

/// Daily mid rates, local currency per one unit of foreign currency.
///
/// A conversion uses the rate published on the last day strictly before the
/// local date of the transaction.
#[derive(Debug, Default)]
pub struct RateTable {
    rates: HashMap<String, BTreeMap<NaiveDate, d128>>,
}

impl RateTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow!("cannot open rates {}: {}", path.display(), e))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::default();
        for row in rdr.deserialize() {
            let row: RateRow = row?;
            table.insert(&row.currency, row.date, row.rate);
        }
        Ok(table)
    }

    pub fn insert(&mut self, currency: &str, date: NaiveDate, rate: d128) {
        self.rates
            .entry(currency.to_lowercase())
            .or_default()
            .insert(date, rate);
    }

    fn rate_before(&self, currency: &str, date: NaiveDate) -> Option<(NaiveDate, d128)> {
        self.rates
            .get(currency)?
            .range(..date)
            .next_back()
            .map(|(d, r)| (*d, *r))
    }
}

impl RateConverter for RateTable {
    fn convert(&self, money: &Money, at: &DateTime<Tz>) -> anyhow::Result<Money> {
        if money.is_local() {
            return Ok(money.clone());
        }

        let currency = money
            .currency()
            .ok_or_else(|| anyhow!("cannot convert {} without a currency", money))?;
        let date = at.naive_local().date();
        let (published, rate) = self
            .rate_before(currency, date)
            .ok_or_else(|| anyhow!("no {} rate before {}", currency.to_uppercase(), date))?;
        trace!("{} rate from {}: {}", currency, published, rate);

        Ok(Money::with_currency(money.amount() * rate, LOCAL_CURRENCY))
    }
}
