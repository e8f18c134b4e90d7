use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    NewPayment, OrderId, Payment, PaymentId, Result, TransactionId, store::PaymentStore,
};

/// PostgreSQL-backed payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Creates a new PostgreSQL payment store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let transaction_id: Uuid = row.try_get("transaction_id")?;

        Ok(Payment {
            id: PaymentId::new(row.try_get("id")?),
            status: row.try_get("status")?,
            transaction_id: Some(TransactionId::from_uuid(transaction_id)),
            order_id: OrderId::new(row.try_get("order_id")?),
            amount: row.try_get("amount")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn save(&self, payment: NewPayment) -> Result<Payment> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO payments (status, transaction_id, order_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&payment.status)
        .bind(payment.transaction_id.as_uuid())
        .bind(payment.order_id.as_i64())
        .bind(payment.amount)
        .fetch_one(&self.pool)
        .await?;

        metrics::counter!("payment_store_writes_total", "backend" => "postgres").increment(1);
        Ok(payment.with_id(PaymentId::new(id)))
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, transaction_id, order_id, amount
            FROM payments
            WHERE order_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }
}
