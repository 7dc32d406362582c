use bigdecimal::BigDecimal;
use std::fmt;

pub const TXNID_MAX_LEN: usize = 40;
pub const PRODUCT_INFO_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 60;
pub const EMAIL_MAX_LEN: usize = 60;
pub const UDF_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Strips control characters and collapses runs of whitespace.
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// The transaction id travels through the gateway round-trip and back, so
/// it is restricted to characters every hop passes through unmangled.
pub fn validate_txnid(txnid: &str) -> ValidationResult {
    validate_required("txnid", txnid)?;
    validate_max_len("txnid", txnid, TXNID_MAX_LEN)?;

    if !txnid
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            "txnid",
            "must contain only letters, digits, '-' and '_'",
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    validate_required("email", email)?;
    validate_max_len("email", email, EMAIL_MAX_LEN)?;

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return Err(ValidationError::new("email", "is not a valid address"));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// More than two fraction digits would be silently truncated by the fixed
/// two-decimal hash rendering, so reject it up front.
pub fn validate_amount_scale(amount: &BigDecimal) -> ValidationResult {
    let (_, exponent) = amount.normalized().as_bigint_and_exponent();
    if exponent > 2 {
        return Err(ValidationError::new(
            "amount",
            "must have at most two decimal places",
        ));
    }

    Ok(())
}

pub fn validate_udf(field: &'static str, value: &str) -> ValidationResult {
    validate_max_len(field, value, UDF_MAX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_txnid() {
        assert!(validate_txnid("TXN-2024_0001").is_ok());
        assert!(validate_txnid("").is_err());
        assert!(validate_txnid("has space").is_err());
        assert!(validate_txnid("pipe|char").is_err());
        assert!(validate_txnid(&"A".repeat(TXNID_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("j@x.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("j@").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn validates_amount_scale() {
        for ok in ["100", "100.5", "100.50", "0.01"] {
            let amount = BigDecimal::from_str(ok).unwrap();
            assert!(validate_amount_scale(&amount).is_ok(), "{}", ok);
        }
        let too_fine = BigDecimal::from_str("100.505").unwrap();
        assert!(validate_amount_scale(&too_fine).is_err());
    }

    #[test]
    fn validates_udf_length() {
        assert!(validate_udf("udf1", &"x".repeat(UDF_MAX_LEN)).is_ok());
        assert!(validate_udf("udf1", &"x".repeat(UDF_MAX_LEN + 1)).is_err());
    }
}
