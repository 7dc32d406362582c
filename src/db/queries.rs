use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{LedgerEntry, Merchant, Transaction};
use crate::domain::TxnStatus;

// --- Transaction queries ---
//
// Every write targets the `txnid` unique constraint: initiation expects the
// insert to be the first, callbacks upsert, the sweep applies a conditional
// update. The constraint is what arbitrates racing writers.

const TRANSACTION_COLUMNS: &str = r#"
    id, txnid, merchant_key, amount, product_info, first_name, email, status,
    hash, hash_verified, gateway_txn_id, bank_ref, bank_name, card_type,
    error_message, raw_response,
    udf1, udf2, udf3, udf4, udf5, udf6, udf7, udf8, udf9, udf10,
    created_at, updated_at
"#;

/// True when the database rejected a write because of a unique constraint.
/// Initiation uses this to classify a reused txnid as a duplicate.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Plain insert used by payment initiation. A duplicate txnid surfaces as a
/// unique-violation error rather than being silently merged.
pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    let sql = format!(
        r#"
        INSERT INTO transactions ({TRANSACTION_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $28)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    );

    bind_transaction(sqlx::query_as::<_, Transaction>(&sql), tx)
        .fetch_one(pool)
        .await
}

/// Idempotent callback write: creates the row if the webhook beat the
/// initiation write, otherwise overwrites everything except identity and
/// `created_at`. Re-applying the same payload changes only `updated_at`.
pub async fn upsert_callback(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    let sql = format!(
        r#"
        INSERT INTO transactions ({TRANSACTION_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $28)
        ON CONFLICT (txnid) DO UPDATE SET
            merchant_key = EXCLUDED.merchant_key,
            amount = EXCLUDED.amount,
            product_info = EXCLUDED.product_info,
            first_name = EXCLUDED.first_name,
            email = EXCLUDED.email,
            status = EXCLUDED.status,
            hash = EXCLUDED.hash,
            hash_verified = EXCLUDED.hash_verified,
            gateway_txn_id = EXCLUDED.gateway_txn_id,
            bank_ref = EXCLUDED.bank_ref,
            bank_name = EXCLUDED.bank_name,
            card_type = EXCLUDED.card_type,
            error_message = EXCLUDED.error_message,
            raw_response = EXCLUDED.raw_response,
            udf1 = EXCLUDED.udf1,
            udf2 = EXCLUDED.udf2,
            udf3 = EXCLUDED.udf3,
            udf4 = EXCLUDED.udf4,
            udf5 = EXCLUDED.udf5,
            udf6 = EXCLUDED.udf6,
            udf7 = EXCLUDED.udf7,
            udf8 = EXCLUDED.udf8,
            udf9 = EXCLUDED.udf9,
            udf10 = EXCLUDED.udf10,
            updated_at = EXCLUDED.updated_at
        RETURNING {TRANSACTION_COLUMNS}
        "#
    );

    bind_transaction(sqlx::query_as::<_, Transaction>(&sql), tx)
        .fetch_one(&mut **executor)
        .await
}

fn bind_transaction<'q>(
    query: sqlx::query::QueryAs<'q, Postgres, Transaction, sqlx::postgres::PgArguments>,
    tx: &'q Transaction,
) -> sqlx::query::QueryAs<'q, Postgres, Transaction, sqlx::postgres::PgArguments> {
    query
        .bind(tx.id)
        .bind(&tx.txnid)
        .bind(&tx.merchant_key)
        .bind(&tx.amount)
        .bind(&tx.product_info)
        .bind(&tx.first_name)
        .bind(&tx.email)
        .bind(tx.status.as_str())
        .bind(&tx.hash)
        .bind(tx.hash_verified)
        .bind(&tx.gateway_txn_id)
        .bind(&tx.bank_ref)
        .bind(&tx.bank_name)
        .bind(&tx.card_type)
        .bind(&tx.error_message)
        .bind(&tx.raw_response)
        .bind(&tx.udf1)
        .bind(&tx.udf2)
        .bind(&tx.udf3)
        .bind(&tx.udf4)
        .bind(&tx.udf5)
        .bind(&tx.udf6)
        .bind(&tx.udf7)
        .bind(&tx.udf8)
        .bind(&tx.udf9)
        .bind(&tx.udf10)
        .bind(tx.created_at)
        .bind(tx.updated_at)
}

pub async fn get_by_txnid(pool: &PgPool, txnid: &str) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE txnid = $1")
        .bind(txnid)
        .fetch_optional(pool)
        .await
}

/// Row-locked status read used by the ingestor to detect terminal-status
/// rewrites before applying its upsert.
pub async fn get_status_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    txnid: &str,
) -> Result<Option<TxnStatus>> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM transactions WHERE txnid = $1 FOR UPDATE")
            .bind(txnid)
            .fetch_optional(&mut **executor)
            .await?;

    Ok(status.and_then(|s| s.parse().ok()))
}

pub async fn set_gateway_txn_id(
    pool: &PgPool,
    txnid: &str,
    gateway_txn_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE transactions SET gateway_txn_id = $2, updated_at = $3 WHERE txnid = $1")
        .bind(txnid)
        .bind(gateway_txn_id)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(())
}

/// Snapshot of rows the gateway never confirmed: still INITIATED or
/// PROCESSING past the staleness cutoff.
pub async fn find_stale(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE status IN ('INITIATED', 'PROCESSING')
        AND created_at < $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Conditional force-fail used by the sweep. The status re-check in the
/// WHERE clause means a callback that committed after the snapshot wins:
/// the sweep then reports the row as skipped, not swept.
pub async fn force_fail_stale(
    pool: &PgPool,
    txnid: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'FAILED', error_message = $2, updated_at = $3
        WHERE txnid = $1 AND status IN ('INITIATED', 'PROCESSING')
        "#,
    )
    .bind(txnid)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Unconditional force-fail for operator intervention.
pub async fn force_fail(
    pool: &PgPool,
    txnid: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE transactions
        SET status = 'FAILED', error_message = $2, updated_at = $3
        WHERE txnid = $1
        RETURNING id
        "#,
    )
    .bind(txnid)
    .bind(error_message)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool) -> Result<std::collections::HashMap<String, i64>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM transactions GROUP BY status")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

// --- Merchant queries ---

pub async fn get_merchant_by_key(pool: &PgPool, merchant_key: &str) -> Result<Option<Merchant>> {
    sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE merchant_key = $1")
        .bind(merchant_key)
        .fetch_optional(pool)
        .await
}

pub async fn insert_merchant(pool: &PgPool, merchant_key: &str, salt: &str) -> Result<Merchant> {
    sqlx::query_as::<_, Merchant>(
        r#"
        INSERT INTO merchants (id, merchant_key, salt, active, created_at)
        VALUES ($1, $2, $3, TRUE, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(merchant_key)
    .bind(salt)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn list_merchants(pool: &PgPool) -> Result<Vec<Merchant>> {
    sqlx::query_as::<_, Merchant>("SELECT * FROM merchants ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
}

// --- Ledger queries ---

/// Records a ledger entry. Credit entries carry a partial unique index on
/// txnid, so a racing double-insert collapses to one row.
pub async fn insert_ledger_entry<'e>(
    executor: impl PgExecutor<'e>,
    entry: &LedgerEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, txnid, merchant_key, amount, direction, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(&entry.txnid)
    .bind(&entry.merchant_key)
    .bind(&entry.amount)
    .bind(&entry.direction)
    .bind(entry.created_at)
    .execute(executor)
    .await?;

    Ok(())
}
