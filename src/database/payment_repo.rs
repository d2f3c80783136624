use sqlx::SqliteExecutor;

use crate::models::PaymentRow;

const SQL_INSERT_PAYMENT: &str = r#"
INSERT INTO payments (
  payment_ref,
  application_id,
  amount_cents,
  received_at
) VALUES (?, ?, ?, ?)
"#;

const SQL_LOAD_PAYMENT: &str = r#"
SELECT
  payment_ref,
  application_id,
  amount_cents,
  received_at
FROM payments
WHERE payment_ref = ?1
LIMIT 1
"#;

pub async fn insert_payment<'e, E>(exec: E, row: &PaymentRow) -> sqlx::Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(SQL_INSERT_PAYMENT)
        .bind(&row.payment_ref)
        .bind(&row.application_id)
        .bind(row.amount_cents)
        .bind(row.received_at)
        .execute(exec)
        .await?;
    Ok(res.rows_affected())
}

pub async fn load_payment<'e, E>(exec: E, payment_ref: &str) -> sqlx::Result<Option<PaymentRow>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, PaymentRow>(SQL_LOAD_PAYMENT)
        .bind(payment_ref)
        .fetch_optional(exec)
        .await
}
