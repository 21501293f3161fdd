pub mod retry_operation;

pub use retry_operation::{RetryOperation, RETRY_OPT};
