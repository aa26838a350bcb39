use decimal::d128;
use ipbox_tax_report::money::Money;
use ipbox_tax_report::rates::RateTable;
use ipbox_tax_report::tax::{calculate_tax, COINBASE_PRO};
use std::io::Write;

#[tokio::test]
async fn parse_and_calculate() {
    let _ = env_logger::builder().is_test(true).try_init();
    let rates = RateTable::from_path("./testdata/rates.csv").unwrap();

    let summary = calculate_tax("./testdata/coinbase_pro.csv", &rates)
        .await
        .unwrap();
    assert_eq!(summary.label, COINBASE_PRO);

    let totals = summary.totals.unwrap();
    assert_eq!(totals.income, Money::with_currency(d128!(1503.00), "pln"));
    assert_eq!(totals.cost, Money::with_currency(d128!(1809.00), "pln"));
    assert_eq!(totals.staking, Money::local_zero());
}

#[tokio::test]
async fn unknown_type_yields_no_totals() {
    let rates = RateTable::from_path("./testdata/rates.csv").unwrap();
    let mut statement = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        statement,
        "portfolio,type,time,amount,balance,amount/balance unit,transfer id,trade id,order id"
    )
    .unwrap();
    writeln!(
        statement,
        "default,match,2021-03-02 10:00:00,-400.00,600.00,EUR,,1,o-1"
    )
    .unwrap();
    writeln!(
        statement,
        "default,convert,2021-03-02 11:00:00,-1.00,599.00,EUR,,2,o-2"
    )
    .unwrap();
    statement.flush().unwrap();

    let err = calculate_tax(statement.path(), &rates).await.unwrap_err();
    assert!(err.to_string().contains("Unknown transaction type convert"));
}

#[tokio::test]
async fn missing_rate_fails_the_file() {
    let rates = RateTable::default();

    let err = calculate_tax("./testdata/coinbase_pro.csv", &rates)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no EUR rate before"));
}
