//! Keyed digest construction and verification for the gateway protocol.
//!
//! The gateway authenticates both directions of the exchange with a SHA-512
//! digest over a fixed, ordered, pipe-separated field sequence. The forward
//! digest signs our outbound initiation request; the reverse digest is the
//! mirror image the gateway computes over its own replies. Both must be
//! reproduced byte for byte: every empty field still contributes its
//! separator.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Length of a SHA-512 digest rendered as lowercase hex.
pub const DIGEST_HEX_LEN: usize = 128;

/// Number of user-defined passthrough slots in the canonical layout.
pub const UDF_SLOTS: usize = 10;

/// Which generation of the gateway's field layout a digest uses.
///
/// The ten-slot form is canonical for everything we emit; the five-slot
/// form survives only so replies signed by older gateway deployments still
/// verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLayout {
    TenSlot,
    FiveSlot,
}

impl HashLayout {
    fn slots(self) -> usize {
        match self {
            HashLayout::TenSlot => 10,
            HashLayout::FiveSlot => 5,
        }
    }
}

/// The ten user-defined fields, kept as an ordered array so the digest
/// field order is mechanically obvious. Slot numbering is 1-based to match
/// the wire names `udf1`..`udf10`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdfFields([Option<String>; UDF_SLOTS]);

impl UdfFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: [Option<String>; UDF_SLOTS]) -> Self {
        Self(slots)
    }

    /// Slot value for hashing: absent and empty are the same input.
    pub fn slot(&self, n: usize) -> &str {
        assert!((1..=UDF_SLOTS).contains(&n), "udf slot out of range: {}", n);
        self.0[n - 1].as_deref().unwrap_or("")
    }

    /// Slot value for storage: empty strings collapse to NULL.
    pub fn get(&self, n: usize) -> Option<&str> {
        assert!((1..=UDF_SLOTS).contains(&n), "udf slot out of range: {}", n);
        self.0[n - 1].as_deref().filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, n: usize, value: impl Into<String>) {
        assert!((1..=UDF_SLOTS).contains(&n), "udf slot out of range: {}", n);
        self.0[n - 1] = Some(value.into());
    }
}

/// The identifying fields bound into every digest, in forward order.
/// `amount` is the already-formatted decimal string (see [`format_amount`]),
/// not a number: formatting drift silently invalidates the digest.
#[derive(Debug, Clone, Copy)]
pub struct DigestFields<'a> {
    pub key: &'a str,
    pub txnid: &'a str,
    pub amount: &'a str,
    pub product_info: &'a str,
    pub first_name: &'a str,
    pub email: &'a str,
    pub udfs: &'a UdfFields,
}

/// Renders an amount exactly as the gateway hashes it: two fraction digits,
/// always. `100` and `100.00` are the same money but different digests.
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.with_scale(2).to_string()
}

/// Digest authorizing an outbound initiation request:
/// `key|txnid|amount|productinfo|firstname|email|udf1|..|udfN|salt`.
pub fn forward_digest(layout: HashLayout, fields: &DigestFields<'_>, salt: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(layout.slots() + 7);
    parts.push(fields.key);
    parts.push(fields.txnid);
    parts.push(fields.amount);
    parts.push(fields.product_info);
    parts.push(fields.first_name);
    parts.push(fields.email);
    for n in 1..=layout.slots() {
        parts.push(fields.udfs.slot(n));
    }
    parts.push(salt);
    sha512_hex(&parts.join("|"))
}

/// Digest the gateway signs its replies with: the exact reverse of the
/// forward sequence, with the reply `status` injected after the salt:
/// `salt|status|udfN|..|udf1|email|firstname|productinfo|amount|txnid|key`.
pub fn reverse_digest(
    layout: HashLayout,
    status: &str,
    fields: &DigestFields<'_>,
    salt: &str,
) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(layout.slots() + 8);
    parts.push(salt);
    parts.push(status);
    for n in (1..=layout.slots()).rev() {
        parts.push(fields.udfs.slot(n));
    }
    parts.push(fields.email);
    parts.push(fields.first_name);
    parts.push(fields.product_info);
    parts.push(fields.amount);
    parts.push(fields.txnid);
    parts.push(fields.key);
    sha512_hex(&parts.join("|"))
}

/// Digest authorizing a server-to-server command call (refund, inquiry):
/// `key|command|var1|salt`.
pub fn command_digest(key: &str, command: &str, var1: &str, salt: &str) -> String {
    sha512_hex(&[key, command, var1, salt].join("|"))
}

/// Case-insensitive, constant-time digest comparison.
pub fn verify(candidate: &str, expected: &str) -> bool {
    let candidate = candidate.to_ascii_lowercase();
    let expected = expected.to_ascii_lowercase();
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Authenticates a gateway reply hash, accepting the canonical layout
/// first and falling back to the legacy five-slot layout.
pub fn verify_reply(
    candidate: &str,
    status: &str,
    fields: &DigestFields<'_>,
    salt: &str,
) -> bool {
    verify(candidate, &reverse_digest(HashLayout::TenSlot, status, fields, salt))
        || verify(candidate, &reverse_digest(HashLayout::FiveSlot, status, fields, salt))
}

fn sha512_hex(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_fields<'a>(udfs: &'a UdfFields) -> DigestFields<'a> {
        DigestFields {
            key: "K1",
            txnid: "TXN1",
            amount: "100.00",
            product_info: "Order",
            first_name: "John",
            email: "j@x.com",
            udfs,
        }
    }

    #[test]
    fn sha512_hex_known_answer() {
        // SHA-512 of the empty string.
        assert_eq!(
            sha512_hex(""),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn forward_digest_matches_literal_concatenation() {
        let udfs = UdfFields::new();
        let digest = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");
        assert_eq!(
            digest,
            sha512_hex("K1|TXN1|100.00|Order|John|j@x.com|||||||||||S1")
        );
        assert_eq!(digest.len(), DIGEST_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn reverse_digest_matches_literal_concatenation() {
        let mut udfs = UdfFields::new();
        udfs.set(1, "m-42");
        udfs.set(2, "order-7");
        let digest = reverse_digest(HashLayout::TenSlot, "success", &sample_fields(&udfs), "S1");
        assert_eq!(
            digest,
            sha512_hex("S1|success|||||||||order-7|m-42|j@x.com|John|Order|100.00|TXN1|K1")
        );
    }

    #[test]
    fn five_slot_layout_uses_fewer_separators() {
        let udfs = UdfFields::new();
        let digest = forward_digest(HashLayout::FiveSlot, &sample_fields(&udfs), "S1");
        assert_eq!(digest, sha512_hex("K1|TXN1|100.00|Order|John|j@x.com||||||S1"));
    }

    #[test]
    fn digest_is_deterministic() {
        let udfs = UdfFields::new();
        let a = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");
        let b = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");
        assert_eq!(a, b);
    }

    #[test]
    fn single_field_tamper_changes_digest() {
        let empty = UdfFields::new();
        let baseline = forward_digest(HashLayout::TenSlot, &sample_fields(&empty), "S1");

        let mut flipped = UdfFields::new();
        flipped.set(7, "x");
        let tampered = forward_digest(HashLayout::TenSlot, &sample_fields(&flipped), "S1");
        assert_ne!(baseline, tampered);

        let mut fields = sample_fields(&empty);
        fields.amount = "100.01";
        assert_ne!(baseline, forward_digest(HashLayout::TenSlot, &fields, "S1"));
    }

    #[test]
    fn absent_and_empty_udf_are_equivalent() {
        let absent = UdfFields::new();
        let explicit = UdfFields::from_slots([
            Some(String::new()),
            Some(String::new()),
            None,
            Some(String::new()),
            None,
            None,
            Some(String::new()),
            None,
            None,
            Some(String::new()),
        ]);
        assert_eq!(
            forward_digest(HashLayout::TenSlot, &sample_fields(&absent), "S1"),
            forward_digest(HashLayout::TenSlot, &sample_fields(&explicit), "S1"),
        );
    }

    #[test]
    fn verify_is_case_insensitive() {
        let udfs = UdfFields::new();
        let digest = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");
        assert!(verify(&digest.to_uppercase(), &digest));
        assert!(!verify("deadbeef", &digest));
        assert!(!verify("", &digest));
    }

    #[test]
    fn verify_reply_accepts_legacy_layout() {
        let mut udfs = UdfFields::new();
        udfs.set(3, "routing");
        let fields = sample_fields(&udfs);

        let canonical = reverse_digest(HashLayout::TenSlot, "success", &fields, "S1");
        let legacy = reverse_digest(HashLayout::FiveSlot, "success", &fields, "S1");

        assert!(verify_reply(&canonical, "success", &fields, "S1"));
        assert!(verify_reply(&legacy, "success", &fields, "S1"));
        assert!(!verify_reply(&canonical, "failure", &fields, "S1"));
    }

    #[test]
    fn amount_formatting_is_stable() {
        let cases = [("100", "100.00"), ("100.5", "100.50"), ("0", "0.00"), ("12.34", "12.34")];
        for (input, expected) in cases {
            let amount = BigDecimal::from_str(input).expect("valid decimal");
            assert_eq!(format_amount(&amount), expected);
        }
    }

    #[test]
    fn command_digest_joins_four_fields() {
        assert_eq!(
            command_digest("K1", "refund_transaction", "GW-9", "S1"),
            sha512_hex("K1|refund_transaction|GW-9|S1")
        );
    }
}
