//! Refund pass-through for confirmed payments.
//!
//! The broker does not model a refund lifecycle; it gates the command,
//! forwards it, and records the ledger entry. Everything else is the
//! gateway's problem.

use bigdecimal::BigDecimal;
use sqlx::PgPool;

use crate::db::models::{LedgerEntry, DIRECTION_REFUND};
use crate::db::queries;
use crate::domain::TxnStatus;
use crate::error::AppError;
use crate::gateway::GatewayClient;
use crate::hash;
use crate::validation;

#[derive(Debug, Clone)]
pub struct RefundInput {
    pub txnid: String,
    /// Defaults to the full captured amount.
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub struct RefundOutput {
    pub txnid: String,
    pub refunded_amount: String,
    pub gateway_status: String,
}

pub async fn refund(
    pool: &PgPool,
    client: &GatewayClient,
    input: RefundInput,
) -> Result<RefundOutput, AppError> {
    let tx = queries::get_by_txnid(pool, &input.txnid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", input.txnid)))?;

    if tx.status != TxnStatus::Success {
        return Err(AppError::Validation(format!(
            "only successful transactions can be refunded, {} is {}",
            tx.txnid, tx.status
        )));
    }
    if !tx.hash_verified {
        return Err(AppError::HashMismatch(format!(
            "refund refused, transaction {} was never hash-verified",
            tx.txnid
        )));
    }
    let gateway_txn_id = tx.gateway_txn_id.as_deref().ok_or_else(|| {
        AppError::Validation(format!("transaction {} has no gateway reference", tx.txnid))
    })?;

    let amount = input.amount.unwrap_or_else(|| tx.amount.clone());
    validation::validate_positive_amount(&amount)?;
    validation::validate_amount_scale(&amount)?;
    if amount > tx.amount {
        return Err(AppError::Validation(
            "refund amount exceeds the captured amount".to_string(),
        ));
    }

    let merchant = queries::get_merchant_by_key(pool, &tx.merchant_key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("unknown merchant key".to_string()))?;

    let amount_str = hash::format_amount(&amount);
    let digest = hash::command_digest(
        &tx.merchant_key,
        "refund_transaction",
        gateway_txn_id,
        &merchant.salt,
    );

    let reply = client
        .refund(&tx.merchant_key, gateway_txn_id, &tx.txnid, &amount_str, &digest)
        .await?;

    let entry = LedgerEntry::new(
        tx.txnid.clone(),
        tx.merchant_key.clone(),
        amount,
        DIRECTION_REFUND,
    );
    queries::insert_ledger_entry(pool, &entry).await?;

    tracing::info!(
        txnid = %tx.txnid,
        amount = %amount_str,
        gateway_status = %reply.status,
        "refund forwarded to gateway"
    );

    Ok(RefundOutput {
        txnid: tx.txnid,
        refunded_amount: amount_str,
        gateway_status: reply.status,
    })
}
