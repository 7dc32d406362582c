//! Merchant-facing JSON surface: initiation, status lookup, refunds.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::error::AppError;
use crate::hash::UdfFields;
use crate::services::initiation::{self, InitiateInput, InitiateOutput};
use crate::services::refund::{self, RefundInput};
use crate::AppState;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub merchant_key: String,
    pub txnid: String,
    #[schema(value_type = String, example = "499.00")]
    pub amount: BigDecimal,
    pub product_info: String,
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub udf1: Option<String>,
    #[serde(default)]
    pub udf2: Option<String>,
    #[serde(default)]
    pub udf3: Option<String>,
    #[serde(default)]
    pub udf4: Option<String>,
    #[serde(default)]
    pub udf5: Option<String>,
    #[serde(default)]
    pub udf6: Option<String>,
    #[serde(default)]
    pub udf7: Option<String>,
    #[serde(default)]
    pub udf8: Option<String>,
    #[serde(default)]
    pub udf9: Option<String>,
    #[serde(default)]
    pub udf10: Option<String>,
}

impl InitiatePaymentRequest {
    fn into_input(self) -> InitiateInput {
        InitiateInput {
            merchant_key: self.merchant_key,
            txnid: self.txnid,
            amount: self.amount,
            product_info: self.product_info,
            first_name: self.first_name,
            email: self.email,
            udfs: UdfFields::from_slots([
                self.udf1, self.udf2, self.udf3, self.udf4, self.udf5, self.udf6, self.udf7,
                self.udf8, self.udf9, self.udf10,
            ]),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub txnid: String,
    pub amount: String,
    pub hash: String,
    pub gateway_status: String,
    pub redirect_url: Option<String>,
}

impl From<InitiateOutput> for InitiatePaymentResponse {
    fn from(output: InitiateOutput) -> Self {
        Self {
            txnid: output.txnid,
            amount: output.amount,
            hash: output.hash,
            gateway_status: output.gateway_status,
            redirect_url: output.redirect_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionView {
    pub txnid: String,
    pub status: String,
    pub amount: String,
    pub hash_verified: bool,
    pub gateway_txn_id: Option<String>,
    pub bank_ref: Option<String>,
    pub bank_name: Option<String>,
    pub card_type: Option<String>,
    pub error_message: Option<String>,
    pub udfs: Vec<Option<String>>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            txnid: tx.txnid.clone(),
            status: tx.status.as_str().to_string(),
            amount: tx.amount.to_string(),
            hash_verified: tx.hash_verified,
            gateway_txn_id: tx.gateway_txn_id.clone(),
            bank_ref: tx.bank_ref.clone(),
            bank_name: tx.bank_name.clone(),
            card_type: tx.card_type.clone(),
            error_message: tx.error_message.clone(),
            udfs: vec![
                tx.udf1.clone(),
                tx.udf2.clone(),
                tx.udf3.clone(),
                tx.udf4.clone(),
                tx.udf5.clone(),
                tx.udf6.clone(),
                tx.udf7.clone(),
                tx.udf8.clone(),
                tx.udf9.clone(),
                tx.udf10.clone(),
            ],
            created_at: tx.created_at.to_rfc3339(),
            updated_at: tx.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RefundRequest {
    /// Omitted means a full refund.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "100.00")]
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundResponse {
    pub txnid: String,
    pub refunded_amount: String,
    pub gateway_status: String,
}

#[utoipa::path(
    post,
    path = "/payments",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Payment initiated", body = InitiatePaymentResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unknown or inactive merchant"),
        (status = 409, description = "Transaction id already used"),
        (status = 503, description = "Gateway unavailable, retry later")
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let output = initiation::initiate(&state.db, &state.gateway, request.into_input()).await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse::from(output)),
    ))
}

#[utoipa::path(
    get,
    path = "/payments/{txnid}",
    params(("txnid" = String, Path, description = "Transaction identifier")),
    responses(
        (status = 200, description = "Transaction found", body = TransactionView),
        (status = 404, description = "Unknown transaction")
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(txnid): Path<String>,
) -> Result<Json<TransactionView>, AppError> {
    let tx = queries::get_by_txnid(&state.db, &txnid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", txnid)))?;

    Ok(Json(TransactionView::from(&tx)))
}

#[utoipa::path(
    post,
    path = "/payments/{txnid}/refund",
    params(("txnid" = String, Path, description = "Transaction identifier")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund forwarded to the gateway", body = RefundResponse),
        (status = 400, description = "Transaction is not refundable"),
        (status = 404, description = "Unknown transaction"),
        (status = 422, description = "Transaction was never hash-verified")
    ),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(txnid): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    let output = refund::refund(
        &state.db,
        &state.gateway,
        RefundInput {
            txnid,
            amount: request.amount,
        },
    )
    .await?;

    Ok(Json(RefundResponse {
        txnid: output.txnid,
        refunded_amount: output.refunded_amount,
        gateway_status: output.gateway_status,
    }))
}
