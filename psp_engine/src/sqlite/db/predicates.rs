//! Translates storage-agnostic [`Predicate`]s and sort fields into SQL over the `orders` table.
//!
//! Every translated clause must select exactly the orders that [`Predicate::matches`] accepts. Absent attributes are
//! stored as `NULL`, which no comparison matches, so the in-memory "absent matches nothing" rule carries over for free.
//!
//! SQLite's `LIKE` folds ASCII letters only. Text searches therefore run against lowercased copies of the searched
//! columns, written with [`fold_case`] when the order is stored, using a pattern folded the same way.
use sqlx::{QueryBuilder, Sqlite};

use super::to_millis;
use crate::psp_api::filter::{fold_case, FilterValue, OrderField, OrderQuery, Predicate, SortKey, SortOrder};

pub(crate) fn column(field: OrderField) -> &'static str {
    match field {
        OrderField::Id => "id",
        OrderField::ProjectId => "project_id",
        OrderField::ProjectName => "project_name",
        OrderField::ProjectAccount => "project_account",
        OrderField::ProjectOrderId => "project_order_id",
        OrderField::FixedPackageName => "fixed_package_name",
        OrderField::PaymentMethodId => "payment_method_id",
        OrderField::PaymentMethodName => "payment_method_name",
        OrderField::PaymentMethodPayerAccount => "payment_method_payer_account",
        OrderField::PayerCountry => "payer_country",
        OrderField::PayerPhone => "payer_phone",
        OrderField::PayerEmail => "payer_email",
        OrderField::Status => "status",
        OrderField::CreatedAt => "created_at",
        OrderField::PaymentMethodClosedAt => "pm_closed_at",
    }
}

/// The column a text search on `field` runs against. Free text is searched in its lowercased copy. Ids and codes are
/// ASCII, which `LIKE` folds by itself. Numbers and times are never matched as text.
pub(crate) fn search_column(field: OrderField) -> Option<&'static str> {
    match field {
        OrderField::Id => Some("id_folded"),
        OrderField::ProjectName => Some("project_name_folded"),
        OrderField::ProjectAccount => Some("project_account_folded"),
        OrderField::ProjectOrderId => Some("project_order_id_folded"),
        OrderField::FixedPackageName => Some("fixed_package_name_folded"),
        OrderField::PaymentMethodName => Some("payment_method_name_folded"),
        OrderField::PaymentMethodPayerAccount => Some("payment_method_payer_account_folded"),
        OrderField::PayerPhone => Some("payer_phone_folded"),
        OrderField::PayerEmail => Some("payer_email_folded"),
        OrderField::ProjectId | OrderField::PaymentMethodId | OrderField::PayerCountry => Some(column(field)),
        OrderField::Status | OrderField::CreatedAt | OrderField::PaymentMethodClosedAt => None,
    }
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::CreatedAt => "created_at",
        SortKey::Status => "status",
        SortKey::ProjectName => "project_name",
        SortKey::Amount => "project_income_amount",
    }
}

/// Escapes the `LIKE` wildcards so that the pattern is matched as literal text.
pub(crate) fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &FilterValue) {
    match value {
        FilterValue::Null => {
            builder.push("NULL");
        },
        FilterValue::Text(s) => {
            builder.push_bind(s.clone());
        },
        FilterValue::Int(i) => {
            builder.push_bind(*i);
        },
        FilterValue::Time(t) => {
            builder.push_bind(to_millis(t));
        },
    }
}

fn push_clauses(builder: &mut QueryBuilder<'_, Sqlite>, clauses: &[Predicate], joiner: &str) {
    builder.push("(");
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            builder.push(joiner);
        }
        push_predicate(builder, clause);
    }
    builder.push(")");
}

/// Appends the SQL form of `predicate` to the builder. The caller supplies the surrounding `WHERE`.
pub fn push_predicate(builder: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::Equals(field, FilterValue::Null) => {
            builder.push(column(*field)).push(" IS NULL");
        },
        Predicate::Equals(field, value) => {
            builder.push(column(*field)).push(" = ");
            push_value(builder, value);
        },
        Predicate::In(_, values) if values.is_empty() => {
            builder.push("0");
        },
        Predicate::In(field, values) => {
            builder.push(column(*field)).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, value);
            }
            builder.push(")");
        },
        Predicate::Range { field, from, to } => {
            let col = column(*field);
            builder.push("(").push(col).push(" IS NOT NULL");
            if let Some(from) = from {
                builder.push(" AND ").push(col).push(" >= ");
                push_value(builder, from);
            }
            if let Some(to) = to {
                builder.push(" AND ").push(col).push(" <= ");
                push_value(builder, to);
            }
            builder.push(")");
        },
        Predicate::Regex { field, pattern } => match search_column(*field) {
            Some(col) => {
                builder.push(col).push(" LIKE '%' || ");
                builder.push_bind(escape_like(&fold_case(pattern)));
                builder.push(" || '%' ESCAPE '\\'");
            },
            None => {
                builder.push("0");
            },
        },
        Predicate::Or(clauses) if clauses.is_empty() => {
            builder.push("0");
        },
        Predicate::Or(clauses) => push_clauses(builder, clauses, " OR "),
        Predicate::And(clauses) if clauses.is_empty() => {
            builder.push("1");
        },
        Predicate::And(clauses) => push_clauses(builder, clauses, " AND "),
    }
}

/// Appends `ORDER BY`, `LIMIT` and `OFFSET` for the query. The order id breaks ties, so pages are stable.
pub fn push_sort_and_page(builder: &mut QueryBuilder<'_, Sqlite>, query: &OrderQuery) {
    builder.push(" ORDER BY ");
    for field in &query.sort {
        let direction = match field.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        builder.push(sort_column(field.key)).push(" ").push(direction).push(", ");
    }
    builder.push("id ASC LIMIT ");
    builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::psp_api::filter::SortField;

    fn sql(predicate: &Predicate) -> String {
        let mut builder = QueryBuilder::<Sqlite>::new("");
        push_predicate(&mut builder, predicate);
        builder.sql().to_string()
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("acme"), "acme");
    }

    #[test]
    fn text_searches_use_folded_columns() {
        let email = sql(&Predicate::contains(OrderField::PayerEmail, "Ivan"));
        assert_eq!(email, "payer_email_folded LIKE '%' || ? || '%' ESCAPE '\\'");
        let country = sql(&Predicate::contains(OrderField::PayerCountry, "d"));
        assert_eq!(country, "payer_country LIKE '%' || ? || '%' ESCAPE '\\'");
        assert_eq!(sql(&Predicate::contains(OrderField::Status, "1")), "0");
    }

    #[test]
    fn empty_sets_and_disjunctions_match_nothing() {
        assert_eq!(sql(&Predicate::In(OrderField::Status, vec![])), "0");
        assert_eq!(sql(&Predicate::Or(vec![])), "0");
        assert_eq!(sql(&Predicate::And(vec![])), "1");
    }

    #[test]
    fn nested_predicates() {
        let predicate = Predicate::And(vec![
            Predicate::In(OrderField::ProjectId, vec![FilterValue::text("p1"), FilterValue::text("p2")]),
            Predicate::Or(vec![
                Predicate::contains(OrderField::ProjectName, "acme"),
                Predicate::Equals(OrderField::PayerEmail, FilterValue::Null),
            ]),
            Predicate::Range { field: OrderField::Status, from: Some(FilterValue::Int(1)), to: None },
        ]);
        assert_eq!(
            sql(&predicate),
            "(project_id IN (?, ?) AND (project_name_folded LIKE '%' || ? || '%' ESCAPE '\\' OR payer_email IS NULL) AND \
             (status IS NOT NULL AND status >= ?))"
        );
    }

    #[test]
    fn sort_ends_with_the_order_id() {
        let query = OrderQuery::new(Predicate::And(vec![]))
            .with_sort(vec![SortField::new(SortKey::Amount, SortOrder::Descending)])
            .with_limit(10);
        let mut builder = QueryBuilder::<Sqlite>::new("");
        push_sort_and_page(&mut builder, &query);
        assert_eq!(builder.sql(), " ORDER BY project_income_amount DESC, id ASC LIMIT ? OFFSET ?");
    }
}
