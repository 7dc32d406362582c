pub mod transaction;

pub use transaction::{ParseStatusError, TxnStatus};
