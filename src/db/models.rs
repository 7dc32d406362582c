use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::TxnStatus;
use crate::hash::UdfFields;

/// Ledger entry directions. Settlement computation over these rows is a
/// downstream concern; we only record them.
pub const DIRECTION_CREDIT: &str = "credit";
pub const DIRECTION_REFUND: &str = "refund";

/// One payment attempt, keyed by the `txnid` shared with the gateway.
/// Every writer upserts by `txnid`; the surrogate `id` exists for audit
/// references only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub txnid: String,
    pub merchant_key: String,
    pub amount: BigDecimal,
    pub product_info: Option<String>,
    pub first_name: Option<String>,
    pub email: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TxnStatus,
    pub hash: Option<String>,
    pub hash_verified: bool,
    pub gateway_txn_id: Option<String>,
    pub bank_ref: Option<String>,
    pub bank_name: Option<String>,
    pub card_type: Option<String>,
    pub error_message: Option<String>,
    pub raw_response: Option<String>,
    pub udf1: Option<String>,
    pub udf2: Option<String>,
    pub udf3: Option<String>,
    pub udf4: Option<String>,
    pub udf5: Option<String>,
    pub udf6: Option<String>,
    pub udf7: Option<String>,
    pub udf8: Option<String>,
    pub udf9: Option<String>,
    pub udf10: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Row written by payment initiation, before the payer is redirected.
    #[allow(clippy::too_many_arguments)]
    pub fn initiated(
        txnid: String,
        merchant_key: String,
        amount: BigDecimal,
        product_info: String,
        first_name: String,
        email: String,
        udfs: &UdfFields,
        forward_hash: String,
    ) -> Self {
        let now = Utc::now();
        let mut tx = Self {
            id: Uuid::new_v4(),
            txnid,
            merchant_key,
            amount,
            product_info: Some(product_info),
            first_name: Some(first_name),
            email: Some(email),
            status: TxnStatus::Initiated,
            hash: Some(forward_hash),
            hash_verified: false,
            gateway_txn_id: None,
            bank_ref: None,
            bank_name: None,
            card_type: None,
            error_message: None,
            raw_response: None,
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
        tx.set_udfs(udfs);
        tx
    }

    pub fn set_udfs(&mut self, udfs: &UdfFields) {
        let owned = |n: usize| udfs.get(n).map(str::to_string);
        self.udf1 = owned(1);
        self.udf2 = owned(2);
        self.udf3 = owned(3);
        self.udf4 = owned(4);
        self.udf5 = owned(5);
        self.udf6 = owned(6);
        self.udf7 = owned(7);
        self.udf8 = owned(8);
        self.udf9 = owned(9);
        self.udf10 = owned(10);
    }

    pub fn udfs(&self) -> UdfFields {
        UdfFields::from_slots([
            self.udf1.clone(),
            self.udf2.clone(),
            self.udf3.clone(),
            self.udf4.clone(),
            self.udf5.clone(),
            self.udf6.clone(),
            self.udf7.clone(),
            self.udf8.clone(),
            self.udf9.clone(),
            self.udf10.clone(),
        ])
    }
}

/// Merchant credentials, consumed read-only by the broker. One shared
/// secret ("salt") per merchant, stored in plaintext.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Merchant {
    pub id: Uuid,
    pub merchant_key: String,
    pub salt: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub txnid: String,
    pub merchant_key: String,
    pub amount: BigDecimal,
    pub direction: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(txnid: String, merchant_key: String, amount: BigDecimal, direction: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            txnid,
            merchant_key,
            amount,
            direction: direction.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn initiated_row_starts_at_initiated() {
        let mut udfs = UdfFields::new();
        udfs.set(1, "merchant-7");
        udfs.set(2, "order-99");

        let tx = Transaction::initiated(
            "TXN1".to_string(),
            "K1".to_string(),
            BigDecimal::from_str("100.00").unwrap(),
            "Order".to_string(),
            "John".to_string(),
            "j@x.com".to_string(),
            &udfs,
            "deadbeef".to_string(),
        );

        assert_eq!(tx.status, TxnStatus::Initiated);
        assert!(!tx.hash_verified);
        assert_eq!(tx.udf1.as_deref(), Some("merchant-7"));
        assert_eq!(tx.udf2.as_deref(), Some("order-99"));
        assert_eq!(tx.udf3, None);
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn udf_round_trip_preserves_slots() {
        let mut udfs = UdfFields::new();
        udfs.set(1, "a");
        udfs.set(10, "z");

        let mut tx = Transaction::initiated(
            "TXN2".to_string(),
            "K1".to_string(),
            BigDecimal::from(5),
            "p".to_string(),
            "f".to_string(),
            "e@x.com".to_string(),
            &UdfFields::new(),
            "h".to_string(),
        );
        tx.set_udfs(&udfs);

        let restored = tx.udfs();
        assert_eq!(restored.slot(1), "a");
        assert_eq!(restored.slot(10), "z");
        assert_eq!(restored.slot(5), "");
    }

    #[test]
    fn empty_udf_strings_collapse_to_null() {
        let mut udfs = UdfFields::new();
        udfs.set(1, "");
        udfs.set(2, "kept");

        let mut tx = Transaction::initiated(
            "TXN3".to_string(),
            "K1".to_string(),
            BigDecimal::from(5),
            "p".to_string(),
            "f".to_string(),
            "e@x.com".to_string(),
            &UdfFields::new(),
            "h".to_string(),
        );
        tx.set_udfs(&udfs);

        assert_eq!(tx.udf1, None);
        assert_eq!(tx.udf2.as_deref(), Some("kept"));
    }
}
