//! Payment initiation: sign the request, record the attempt, hand the
//! payer to the gateway.

use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::PgPool;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::client::InitiationForm;
use crate::gateway::GatewayClient;
use crate::hash::{self, DigestFields, HashLayout, UdfFields};
use crate::validation;

/// Input for one payment attempt.
#[derive(Debug, Clone)]
pub struct InitiateInput {
    pub merchant_key: String,
    pub txnid: String,
    pub amount: BigDecimal,
    pub product_info: String,
    pub first_name: String,
    pub email: String,
    pub udfs: UdfFields,
}

/// Redirect parameters returned to the caller.
#[derive(Debug, Clone)]
pub struct InitiateOutput {
    pub txnid: String,
    pub amount: String,
    pub hash: String,
    pub gateway_status: String,
    pub redirect_url: Option<String>,
}

/// Creates the INITIATED row and forwards the signed request to the
/// gateway.
///
/// The row is written before the outbound call and survives independently
/// of it: if the gateway times out, the caller gets a retryable error and
/// the reconciliation sweep owns the row's fate.
pub async fn initiate(
    pool: &PgPool,
    client: &GatewayClient,
    input: InitiateInput,
) -> Result<InitiateOutput, AppError> {
    validate(&input)?;

    let merchant = queries::get_merchant_by_key(pool, &input.merchant_key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("unknown merchant key".to_string()))?;
    if !merchant.active {
        return Err(AppError::Unauthorized("merchant is inactive".to_string()));
    }

    let amount_str = hash::format_amount(&input.amount);
    let digest = hash::forward_digest(
        HashLayout::TenSlot,
        &DigestFields {
            key: &input.merchant_key,
            txnid: &input.txnid,
            amount: &amount_str,
            product_info: &input.product_info,
            first_name: &input.first_name,
            email: &input.email,
            udfs: &input.udfs,
        },
        &merchant.salt,
    );

    let row = Transaction::initiated(
        input.txnid.clone(),
        input.merchant_key.clone(),
        input.amount.clone(),
        input.product_info.clone(),
        input.first_name.clone(),
        input.email.clone(),
        &input.udfs,
        digest.clone(),
    );

    queries::insert_transaction(pool, &row).await.map_err(|e| {
        if queries::is_unique_violation(&e) {
            AppError::DuplicateTransaction(input.txnid.clone())
        } else {
            AppError::Database(e)
        }
    })?;

    tracing::info!(txnid = %input.txnid, merchant_key = %input.merchant_key, "payment initiated");

    let reply = client
        .initiate(&InitiationForm {
            key: input.merchant_key.clone(),
            txnid: input.txnid.clone(),
            amount: amount_str.clone(),
            product_info: input.product_info.clone(),
            first_name: input.first_name.clone(),
            email: input.email.clone(),
            udfs: input.udfs.clone(),
            hash: digest.clone(),
        })
        .await?;

    if let Some(gateway_txn_id) = &reply.gateway_txn_id {
        queries::set_gateway_txn_id(pool, &input.txnid, gateway_txn_id, Utc::now()).await?;
    }

    Ok(InitiateOutput {
        txnid: input.txnid,
        amount: amount_str,
        hash: digest,
        gateway_status: reply.status,
        redirect_url: reply.redirect_url,
    })
}

fn validate(input: &InitiateInput) -> Result<(), AppError> {
    validation::validate_txnid(&input.txnid)?;
    validation::validate_positive_amount(&input.amount)?;
    validation::validate_amount_scale(&input.amount)?;
    validation::validate_required("merchant_key", &input.merchant_key)?;
    validation::validate_required("product_info", &input.product_info)?;
    validation::validate_max_len(
        "product_info",
        &input.product_info,
        validation::PRODUCT_INFO_MAX_LEN,
    )?;
    validation::validate_required("first_name", &input.first_name)?;
    validation::validate_max_len("first_name", &input.first_name, validation::NAME_MAX_LEN)?;
    validation::validate_email(&input.email)?;
    for n in 1..=hash::UDF_SLOTS {
        validation::validate_udf("udf", input.udfs.slot(n))?;
    }

    Ok(())
}
