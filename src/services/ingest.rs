//! Callback ingestion: the component that races hardest.
//!
//! Redirect posts, webhooks and redeliveries of either can all arrive for
//! the same txnid, in any order, possibly before our own initiation write
//! is visible. Everything funnels into one idempotent upsert keyed by
//! txnid; hash verification decides how much of the payload we trust, never
//! whether we persist it.

use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::models::{LedgerEntry, Transaction, DIRECTION_CREDIT};
use crate::db::queries;
use crate::domain::TxnStatus;
use crate::error::AppError;
use crate::hash::{self, DigestFields, UdfFields};
use crate::validation::{validate_required, ValidationError};

/// Which inbound channel delivered the callback. Purely diagnostic; both
/// channels run the same authenticate-and-upsert path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackChannel {
    Webhook,
    RedirectSuccess,
    RedirectFailure,
}

impl fmt::Display for CallbackChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackChannel::Webhook => "webhook",
            CallbackChannel::RedirectSuccess => "redirect-success",
            CallbackChannel::RedirectFailure => "redirect-failure",
        };
        f.write_str(name)
    }
}

/// Callback fields as the gateway posts them. Only `txnid` is mandatory:
/// everything else defaults so that a mangled payload still produces an
/// inspectable row instead of being dropped.
#[derive(Debug, Clone, Default)]
pub struct CallbackFields {
    pub key: String,
    pub txnid: String,
    pub amount_raw: String,
    pub product_info: String,
    pub first_name: String,
    pub email: String,
    pub status_raw: String,
    pub hash: String,
    pub gateway_txn_id: Option<String>,
    pub bank_ref: Option<String>,
    pub bank_name: Option<String>,
    pub card_type: Option<String>,
    pub error_message: Option<String>,
    pub udfs: UdfFields,
}

impl CallbackFields {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let field = |name: &str| form.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| form.get(name).cloned().filter(|v| !v.is_empty());

        let txnid = field("txnid");
        validate_required("txnid", &txnid)?;

        let mut udfs = UdfFields::new();
        for n in 1..=hash::UDF_SLOTS {
            if let Some(value) = form.get(&format!("udf{}", n)) {
                udfs.set(n, value.clone());
            }
        }

        Ok(Self {
            key: field("key"),
            txnid,
            amount_raw: field("amount"),
            product_info: field("productinfo"),
            first_name: field("firstname"),
            email: field("email"),
            status_raw: field("status"),
            hash: field("hash"),
            gateway_txn_id: optional("gateway_txn_id"),
            bank_ref: optional("bank_ref"),
            bank_name: optional("bank_name"),
            card_type: optional("card_type"),
            error_message: optional("error_message"),
            udfs,
        })
    }
}

/// What a callback did to the transaction record.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub txnid: String,
    pub status: TxnStatus,
    pub hash_verified: bool,
    /// A different terminal status was already recorded and has been
    /// overwritten (last-write-wins). Logged loudly upstream of here.
    pub superseded_terminal: bool,
}

/// Authenticates and persists one gateway callback.
///
/// A failed hash check is an outcome, not an error: the row is stored as
/// HASH_MISMATCH with every received field intact for manual review. Only
/// storage faults propagate as errors.
pub async fn ingest_callback(
    pool: &PgPool,
    fields: &CallbackFields,
    raw_body: &str,
    channel: CallbackChannel,
) -> Result<IngestOutcome, AppError> {
    let merchant = queries::get_merchant_by_key(pool, &fields.key).await?;

    let verified = match &merchant {
        Some(m) => {
            let digest_fields = DigestFields {
                key: &fields.key,
                txnid: &fields.txnid,
                // The digest binds the amount string exactly as the gateway
                // sent it; reformatting here would break verification.
                amount: &fields.amount_raw,
                product_info: &fields.product_info,
                first_name: &fields.first_name,
                email: &fields.email,
                udfs: &fields.udfs,
            };
            hash::verify_reply(&fields.hash, &fields.status_raw, &digest_fields, &m.salt)
        }
        None => {
            tracing::warn!(
                txnid = %fields.txnid,
                merchant_key = %fields.key,
                %channel,
                "callback for unknown merchant key, cannot verify hash"
            );
            false
        }
    };

    let status = if verified {
        TxnStatus::from_gateway(&fields.status_raw)
    } else {
        TxnStatus::HashMismatch
    };

    let amount = BigDecimal::from_str(&fields.amount_raw).unwrap_or_else(|_| {
        tracing::warn!(
            txnid = %fields.txnid,
            amount = %fields.amount_raw,
            %channel,
            "callback amount did not parse, storing zero"
        );
        BigDecimal::from(0)
    });

    let error_message = if !verified {
        Some("hash verification failed, flagged for manual review".to_string())
    } else if status == TxnStatus::Failed {
        Some(
            fields
                .error_message
                .clone()
                .unwrap_or_else(|| format!("gateway reported status '{}'", fields.status_raw)),
        )
    } else {
        None
    };

    let now = Utc::now();
    let mut row = Transaction {
        id: Uuid::new_v4(),
        txnid: fields.txnid.clone(),
        merchant_key: fields.key.clone(),
        amount,
        product_info: non_empty(&fields.product_info),
        first_name: non_empty(&fields.first_name),
        email: non_empty(&fields.email),
        status,
        hash: non_empty(&fields.hash),
        hash_verified: verified,
        gateway_txn_id: fields.gateway_txn_id.clone(),
        bank_ref: fields.bank_ref.clone(),
        bank_name: fields.bank_name.clone(),
        card_type: fields.card_type.clone(),
        error_message,
        raw_response: Some(raw_body.to_string()),
        udf1: None,
        udf2: None,
        udf3: None,
        udf4: None,
        udf5: None,
        udf6: None,
        udf7: None,
        udf8: None,
        udf9: None,
        udf10: None,
        created_at: now,
        updated_at: now,
    };
    row.set_udfs(&fields.udfs);

    let mut db_tx = pool.begin().await?;

    let prior = queries::get_status_for_update(&mut db_tx, &fields.txnid).await?;
    let superseded_terminal = match prior {
        Some(prior_status) if prior_status.is_terminal() && prior_status != status => {
            tracing::warn!(
                txnid = %fields.txnid,
                prior = %prior_status,
                incoming = %status,
                %channel,
                "terminal status rewritten by a later callback, keeping last write"
            );
            true
        }
        _ => false,
    };

    let stored = queries::upsert_callback(&mut db_tx, &row).await?;

    // First confirmation of this payment funds the ledger; redeliveries of
    // the same success do not.
    if status == TxnStatus::Success && prior != Some(TxnStatus::Success) {
        let entry = LedgerEntry::new(
            stored.txnid.clone(),
            stored.merchant_key.clone(),
            stored.amount.clone(),
            DIRECTION_CREDIT,
        );
        queries::insert_ledger_entry(&mut *db_tx, &entry).await?;
    }

    db_tx.commit().await?;

    tracing::info!(
        txnid = %stored.txnid,
        status = %stored.status,
        hash_verified = stored.hash_verified,
        %channel,
        "callback ingested"
    );

    Ok(IngestOutcome {
        txnid: stored.txnid,
        status: stored.status,
        hash_verified: stored.hash_verified,
        superseded_terminal,
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_form_requires_txnid() {
        let missing = form(&[("status", "success")]);
        assert!(CallbackFields::from_form(&missing).is_err());

        let blank = form(&[("txnid", "  ")]);
        assert!(CallbackFields::from_form(&blank).is_err());
    }

    #[test]
    fn from_form_collects_udf_slots() {
        let parsed = CallbackFields::from_form(&form(&[
            ("txnid", "TXN1"),
            ("udf1", "m-1"),
            ("udf10", "tail"),
            ("udf4", ""),
        ]))
        .expect("valid form");

        assert_eq!(parsed.udfs.slot(1), "m-1");
        assert_eq!(parsed.udfs.slot(10), "tail");
        assert_eq!(parsed.udfs.slot(4), "");
        assert_eq!(parsed.udfs.slot(7), "");
    }

    #[test]
    fn from_form_defaults_missing_fields() {
        let parsed =
            CallbackFields::from_form(&form(&[("txnid", "TXN1")])).expect("valid form");

        assert_eq!(parsed.key, "");
        assert_eq!(parsed.amount_raw, "");
        assert_eq!(parsed.gateway_txn_id, None);
        assert_eq!(parsed.error_message, None);
    }

    #[test]
    fn empty_optional_fields_collapse_to_none() {
        let parsed = CallbackFields::from_form(&form(&[
            ("txnid", "TXN1"),
            ("bank_ref", ""),
            ("bank_name", "Example Bank"),
        ]))
        .expect("valid form");

        assert_eq!(parsed.bank_ref, None);
        assert_eq!(parsed.bank_name.as_deref(), Some("Example Bank"));
    }
}
