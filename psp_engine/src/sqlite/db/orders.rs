use log::*;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection};

use super::{
    predicates::{push_predicate, push_sort_and_page},
    to_millis,
};
use crate::{
    db_types::{Order, OrderId, OrderStatusType, ProjectId},
    psp_api::{
        filter::{fold_case, OrderQuery, Predicate},
        revenue_objects::RevenueDynamicRequest,
    },
    traits::RepositoryError,
};

/// The columns that mirror order attributes, in the order [`OrderColumns::bind_all`] binds them.
const ORDER_COLUMNS: &str = "merchant_id, project_id, project_name, project_account, project_order_id, \
                             project_income_amount, fixed_package_name, payment_method_id, payment_method_name, \
                             payment_method_payer_account, payer_country, payer_phone, payer_email, status, \
                             created_at, pm_closed_at, id_folded, project_name_folded, project_account_folded, \
                             project_order_id_folded, fixed_package_name_folded, payment_method_name_folded, \
                             payment_method_payer_account_folded, payer_phone_folded, payer_email_folded, document";

/// The searchable columns of an order, extracted from the document they are stored next to.
struct OrderColumns {
    merchant_id: String,
    project_id: String,
    project_name: String,
    project_account: String,
    project_order_id: Option<String>,
    project_income_amount: i64,
    fixed_package_name: Option<String>,
    payment_method_id: Option<String>,
    payment_method_name: Option<String>,
    payment_method_payer_account: Option<String>,
    payer_country: Option<String>,
    payer_phone: Option<String>,
    payer_email: Option<String>,
    status: i32,
    created_at: i64,
    pm_closed_at: Option<i64>,
    id: String,
    document: String,
}

impl OrderColumns {
    fn try_from_order(order: &Order) -> Result<Self, RepositoryError> {
        let project_income_amount = order.project_income_amount.to_minor().ok_or_else(|| {
            RepositoryError::SerializationError(format!("Income amount {} is out of range", order.project_income_amount))
        })?;
        let pm = order.payment_method.as_ref();
        Ok(Self {
            merchant_id: order.merchant_id().to_string(),
            project_id: order.project.id.to_string(),
            project_name: order.project.name.clone(),
            project_account: order.project_account.clone(),
            project_order_id: order.project_order_id.clone(),
            project_income_amount,
            fixed_package_name: order.fixed_package.as_ref().map(|p| p.name.clone()),
            payment_method_id: pm.map(|pm| pm.id.to_string()),
            payment_method_name: pm.map(|pm| pm.name.clone()),
            payment_method_payer_account: order.payment_method_payer_account.clone(),
            payer_country: order.payer_data.country.clone(),
            payer_phone: order.payer_data.phone.clone(),
            payer_email: order.payer_data.email.clone(),
            status: order.status.code(),
            created_at: to_millis(&order.created_at),
            pm_closed_at: order.payment_method_order_closed_at.as_ref().map(to_millis),
            id: order.id.to_string(),
            document: serde_json::to_string(order)?,
        })
    }

    fn bind_all(self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let fold = |s: &Option<String>| s.as_deref().map(fold_case);
        let folded = [
            fold(&self.project_order_id),
            fold(&self.fixed_package_name),
            fold(&self.payment_method_name),
            fold(&self.payment_method_payer_account),
            fold(&self.payer_phone),
            fold(&self.payer_email),
        ];
        let id_folded = fold_case(&self.id);
        let project_name_folded = fold_case(&self.project_name);
        let project_account_folded = fold_case(&self.project_account);
        let mut values = builder.separated(", ");
        values.push_bind(self.merchant_id);
        values.push_bind(self.project_id);
        values.push_bind(self.project_name);
        values.push_bind(self.project_account);
        values.push_bind(self.project_order_id);
        values.push_bind(self.project_income_amount);
        values.push_bind(self.fixed_package_name);
        values.push_bind(self.payment_method_id);
        values.push_bind(self.payment_method_name);
        values.push_bind(self.payment_method_payer_account);
        values.push_bind(self.payer_country);
        values.push_bind(self.payer_phone);
        values.push_bind(self.payer_email);
        values.push_bind(self.status);
        values.push_bind(self.created_at);
        values.push_bind(self.pm_closed_at);
        values.push_bind(id_folded);
        values.push_bind(project_name_folded);
        values.push_bind(project_account_folded);
        for value in folded {
            values.push_bind(value);
        }
        values.push_bind(self.document);
    }
}

/// Rebuilds an order from its stored document. The row's version column is authoritative.
fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let document = row.try_get::<String, _>("document")?;
    let mut order = serde_json::from_str::<Order>(&document)?;
    order.version = row.try_get("version")?;
    Ok(order)
}

async fn fetch_one(
    builder: &mut QueryBuilder<'_, Sqlite>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, RepositoryError> {
    let row = builder.build().fetch_optional(conn).await?;
    row.as_ref().map(order_from_row).transpose()
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, RepositoryError> {
    let mut builder = QueryBuilder::new("SELECT document, version FROM orders WHERE id = ");
    builder.push_bind(id.as_str());
    fetch_one(&mut builder, conn).await
}

pub async fn fetch_order_by_project_order_id(
    project: &ProjectId,
    project_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, RepositoryError> {
    let mut builder = QueryBuilder::new("SELECT document, version FROM orders WHERE project_id = ");
    builder.push_bind(project.as_str());
    builder.push(" AND project_order_id = ");
    builder.push_bind(project_order_id);
    builder.push(" LIMIT 1");
    fetch_one(&mut builder, conn).await
}

pub async fn insert_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), RepositoryError> {
    let columns = OrderColumns::try_from_order(order)?;
    let mut builder = QueryBuilder::new(format!("INSERT INTO orders (id, version, {ORDER_COLUMNS}) VALUES ("));
    builder.push_bind(order.id.as_str()).push(", ").push_bind(order.version).push(", ");
    columns.bind_all(&mut builder);
    builder.push(")");
    match builder.build().execute(conn).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(RepositoryError::OrderAlreadyExists(order.id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Overwrites the stored order if, and only if, the stored version equals `order.version`. The stored version is
/// incremented. Returns the number of rows that were updated, i.e. 0 or 1.
pub async fn update_order_if_version(order: &Order, conn: &mut SqliteConnection) -> Result<u64, RepositoryError> {
    let columns = OrderColumns::try_from_order(order)?;
    let mut builder = QueryBuilder::new("UPDATE orders SET version = version + 1, (");
    builder.push(ORDER_COLUMNS).push(") = (");
    columns.bind_all(&mut builder);
    builder.push(") WHERE id = ");
    builder.push_bind(order.id.as_str());
    builder.push(" AND version = ");
    builder.push_bind(order.version);
    let result = builder.build().execute(conn).await?;
    trace!("🗃️ Update of order {} at version {} touched {} rows", order.id, order.version, result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn fetch_version(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<i64>, RepositoryError> {
    let version = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(version)
}

pub async fn count_orders(predicate: &Predicate, conn: &mut SqliteConnection) -> Result<u64, RepositoryError> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE ");
    push_predicate(&mut builder, predicate);
    let count: i64 = builder.build_query_scalar().fetch_one(conn).await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

pub async fn search_orders(query: &OrderQuery, conn: &mut SqliteConnection) -> Result<Vec<Order>, RepositoryError> {
    let mut builder = QueryBuilder::new("SELECT document, version FROM orders WHERE ");
    push_predicate(&mut builder, &query.predicate);
    push_sort_and_page(&mut builder, query);
    trace!("🗃️ Searching orders: {}", builder.sql());
    let rows = builder.build().fetch_all(conn).await?;
    rows.iter().map(order_from_row).collect()
}

/// Completed orders of the request's merchant that the payment system closed within the request's range.
pub async fn fetch_settled_orders(
    request: &RevenueDynamicRequest,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query(
        r#"SELECT document, version FROM orders
        WHERE merchant_id = $1 AND status = $2 AND pm_closed_at >= $3 AND pm_closed_at <= $4
        ORDER BY pm_closed_at"#,
    )
    .bind(request.merchant_id.as_str())
    .bind(OrderStatusType::Complete.code())
    .bind(to_millis(&request.from))
    .bind(to_millis(&request.to))
    .fetch_all(conn)
    .await?;
    rows.iter().map(order_from_row).collect()
}
