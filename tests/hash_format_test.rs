//! The wire format of the gateway's keyed digests, pinned against
//! independently computed SHA-512 values. A drifting separator count or
//! amount rendering shows up here before it shows up as a silent
//! verification failure in production.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use paybridge::hash::{
    self, format_amount, forward_digest, reverse_digest, verify, verify_reply, DigestFields,
    HashLayout, UdfFields,
};

/// SHA-512 of `K1|TXN1|100.00|Order|John|j@x.com|||||||||||S1`
/// (ten empty UDF slots, 16 pipes in total).
const FORWARD_TEN_SLOT: &str = "874ff3c9dc6ad028cdfc20765ccab668b20bff3d0b9b7ce3afdd3f6fbcad1684\
                                7cd7ede9f162807a56594cf56df0b7f5e604822d0494c230fce7d8cdd5084f80";

/// SHA-512 of `K1|TXN1|100.00|Order|John|j@x.com||||||S1` (legacy five-slot
/// layout, five empty UDF slots).
const FORWARD_FIVE_SLOT: &str = "19832b32b47887c5769d15c7c6b62981788d3538b4d8fe3ffbe11d7b5f4550d1\
                                 f0366785354b266df37cd9a07782de39cd823fafe24ae849a56cf98b28f23898";

/// SHA-512 of `S1|success|||||||||||j@x.com|John|Order|100.00|TXN1|K1`
/// (ten empty UDF slots between the status and the customer fields).
const REVERSE_TEN_SLOT: &str = "fea45e6ae550bdb13114ea9646cf51ef54b26369499dba7a0cc2c3ee16996566\
                                e30eb48449de389d7134cb590a6d5e3fb3573bc53dad0c11c30638aa0233bc1a";

fn sample_fields(udfs: &UdfFields) -> DigestFields<'_> {
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
fn forward_digest_matches_pinned_value() {
    let udfs = UdfFields::new();
    assert_eq!(
        forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1"),
        FORWARD_TEN_SLOT
    );
}

#[test]
fn legacy_forward_digest_matches_pinned_value() {
    let udfs = UdfFields::new();
    assert_eq!(
        forward_digest(HashLayout::FiveSlot, &sample_fields(&udfs), "S1"),
        FORWARD_FIVE_SLOT
    );
}

#[test]
fn reverse_digest_matches_pinned_value() {
    let udfs = UdfFields::new();
    assert_eq!(
        reverse_digest(HashLayout::TenSlot, "success", &sample_fields(&udfs), "S1"),
        REVERSE_TEN_SLOT
    );
}

#[test]
fn digests_are_deterministic() {
    let mut udfs = UdfFields::new();
    udfs.set(1, "merchant-7");
    let fields = sample_fields(&udfs);

    assert_eq!(
        forward_digest(HashLayout::TenSlot, &fields, "S1"),
        forward_digest(HashLayout::TenSlot, &fields, "S1")
    );
    assert_eq!(
        reverse_digest(HashLayout::TenSlot, "success", &fields, "S1"),
        reverse_digest(HashLayout::TenSlot, "success", &fields, "S1")
    );
}

#[test]
fn flipping_one_udf_slot_changes_the_digest() {
    let empty = UdfFields::new();
    let baseline = forward_digest(HashLayout::TenSlot, &sample_fields(&empty), "S1");

    for n in 1..=hash::UDF_SLOTS {
        let mut udfs = UdfFields::new();
        udfs.set(n, "x");
        let tampered = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");
        assert_ne!(baseline, tampered, "udf{} flip went unnoticed", n);
    }
}

#[test]
fn every_non_udf_field_is_bound_into_the_digest() {
    let udfs = UdfFields::new();
    let baseline = forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S1");

    let variations: [(&str, fn(&mut DigestFields<'_>)); 6] = [
        ("key", |f| f.key = "K2"),
        ("txnid", |f| f.txnid = "TXN2"),
        ("amount", |f| f.amount = "100.01"),
        ("product_info", |f| f.product_info = "Order2"),
        ("first_name", |f| f.first_name = "Jane"),
        ("email", |f| f.email = "k@x.com"),
    ];
    for (name, mutate) in variations {
        let mut fields = sample_fields(&udfs);
        mutate(&mut fields);
        assert_ne!(
            baseline,
            forward_digest(HashLayout::TenSlot, &fields, "S1"),
            "{} change went unnoticed",
            name
        );
    }

    assert_ne!(
        baseline,
        forward_digest(HashLayout::TenSlot, &sample_fields(&udfs), "S2")
    );
}

#[test]
fn absent_and_empty_udfs_hash_identically() {
    let absent = UdfFields::new();

    let mut explicit_empty = UdfFields::new();
    for n in 1..=hash::UDF_SLOTS {
        explicit_empty.set(n, "");
    }

    assert_eq!(
        forward_digest(HashLayout::TenSlot, &sample_fields(&absent), "S1"),
        forward_digest(HashLayout::TenSlot, &sample_fields(&explicit_empty), "S1")
    );
}

#[test]
fn verification_is_case_insensitive_and_exact() {
    let udfs = UdfFields::new();
    assert!(verify(&FORWARD_TEN_SLOT.to_uppercase(), FORWARD_TEN_SLOT));
    assert!(!verify(FORWARD_FIVE_SLOT, FORWARD_TEN_SLOT));
    assert!(!verify("", FORWARD_TEN_SLOT));

    let fields = sample_fields(&udfs);
    assert!(verify_reply(REVERSE_TEN_SLOT, "success", &fields, "S1"));
    assert!(!verify_reply(REVERSE_TEN_SLOT, "failure", &fields, "S1"));
}

#[test]
fn replies_signed_with_the_legacy_layout_still_verify() {
    let mut udfs = UdfFields::new();
    udfs.set(2, "order-7");
    let fields = sample_fields(&udfs);

    let legacy = reverse_digest(HashLayout::FiveSlot, "success", &fields, "S1");
    assert!(verify_reply(&legacy, "success", &fields, "S1"));
}

#[test]
fn amounts_always_hash_with_two_fraction_digits() {
    for (input, rendered) in [("100", "100.00"), ("100.5", "100.50"), ("0.1", "0.10")] {
        let amount = BigDecimal::from_str(input).expect("valid decimal");
        assert_eq!(format_amount(&amount), rendered);
    }

    // `100` and `100.00` are the same money and must be the same digest.
    let whole = format_amount(&BigDecimal::from_str("100").unwrap());
    let udfs = UdfFields::new();
    let mut fields = sample_fields(&udfs);
    fields.amount = &whole;
    assert_eq!(
        forward_digest(HashLayout::TenSlot, &fields, "S1"),
        FORWARD_TEN_SLOT
    );
}
