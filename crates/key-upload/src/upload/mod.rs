//! Diagnosis key upload: envelope decryption, validation, and persistence.
//!
//! # Module invariants
//!
//! - **Fail fast, in order.** The step order in [`pipeline`] is part of the
//!   wire contract; reordering changes which error a client sees.
//! - **One log line per rejection.** Validators return failures and never log;
//!   the pipeline logs each rejection once.
//! - **No partial writes.** Nothing reaches the store until every check passed.

pub mod pipeline;
pub mod validator;

pub use pipeline::{UploadPipeline, UploadReply};
