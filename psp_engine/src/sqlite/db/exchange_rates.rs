use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection};

use super::{from_millis, to_millis};
use crate::{psp_api::exchange_objects::ExchangeRate, traits::ExchangeRateError};

#[derive(Debug, FromRow)]
struct ExchangeRateRow {
    base_currency: String,
    quote_currency: String,
    rate: String,
    updated_at: i64,
}

impl TryFrom<ExchangeRateRow> for ExchangeRate {
    type Error = ExchangeRateError;

    fn try_from(row: ExchangeRateRow) -> Result<Self, Self::Error> {
        let rate = Decimal::from_str(&row.rate).map_err(|e| ExchangeRateError::InvalidRate(e.to_string()))?;
        Ok(ExchangeRate::new(&row.base_currency, &row.quote_currency, rate, Some(from_millis(row.updated_at))))
    }
}

pub async fn fetch_last_rate(
    base: &str,
    quote: &str,
    conn: &mut SqliteConnection,
) -> Result<ExchangeRate, ExchangeRateError> {
    let row: Option<ExchangeRateRow> = sqlx::query_as(
        r#"SELECT base_currency, quote_currency, rate, updated_at FROM exchange_rates
        WHERE base_currency = $1 AND quote_currency = $2
        ORDER BY updated_at DESC, id DESC LIMIT 1"#,
    )
    .bind(base.to_ascii_uppercase())
    .bind(quote.to_ascii_uppercase())
    .fetch_optional(conn)
    .await
    .map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
    row.ok_or_else(|| ExchangeRateError::RateDoesNotExist(format!("{base}/{quote}")))?.try_into()
}

pub async fn set_exchange_rate(rate: &ExchangeRate, conn: &mut SqliteConnection) -> Result<(), ExchangeRateError> {
    sqlx::query(
        r#"INSERT INTO exchange_rates (base_currency, quote_currency, rate, updated_at) VALUES ($1, $2, $3, $4)"#,
    )
    .bind(rate.base_currency.to_ascii_uppercase())
    .bind(rate.quote_currency.to_ascii_uppercase())
    .bind(rate.rate.to_string())
    .bind(to_millis(&rate.updated_at))
    .execute(conn)
    .await
    .map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
    Ok(())
}
