use std::str::FromStr;

use psp_common::Amount;
use sqlx::{FromRow, SqliteConnection};

use super::{from_millis, to_millis};
use crate::{
    db_types::MerchantId,
    psp_api::revenue_objects::{Refund, RevenueDynamicRequest},
    traits::RepositoryError,
};

#[derive(Debug, FromRow)]
struct RefundRow {
    order_id: String,
    merchant_id: String,
    amount: String,
    is_chargeback: bool,
    created_at: i64,
}

impl TryFrom<RefundRow> for Refund {
    type Error = RepositoryError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        let amount = Amount::from_str(&row.amount).map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        Ok(Refund {
            order_id: row.order_id.into(),
            merchant_id: MerchantId::from(row.merchant_id),
            amount,
            is_chargeback: row.is_chargeback,
            created_at: from_millis(row.created_at),
        })
    }
}

pub async fn insert_refund(refund: &Refund, conn: &mut SqliteConnection) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO refunds (order_id, merchant_id, amount, is_chargeback, created_at) VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(refund.order_id.as_str())
    .bind(refund.merchant_id.as_str())
    .bind(refund.amount.to_string())
    .bind(refund.is_chargeback)
    .bind(to_millis(&refund.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// The merchant's refunds and chargebacks created within the request's range.
pub async fn fetch_refunds(
    request: &RevenueDynamicRequest,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, RepositoryError> {
    let rows: Vec<RefundRow> = sqlx::query_as(
        r#"SELECT order_id, merchant_id, amount, is_chargeback, created_at FROM refunds
        WHERE merchant_id = $1 AND created_at >= $2 AND created_at <= $3
        ORDER BY created_at"#,
    )
    .bind(request.merchant_id.as_str())
    .bind(to_millis(&request.from))
    .bind(to_millis(&request.to))
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Refund::try_from).collect()
}
