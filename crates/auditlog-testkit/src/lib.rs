//! Shared test utilities for the auditlog workspace.
//!
//! This crate provides:
//! - **arb**: Proptest strategies for raw entries and canonical records
//! - **fixtures**: A fixed clock, sample raw entries per audit type, sample configs
//! - **schema**: JSON schema validation for run receipts and configs
//!
//! # Example
//!
//! ```rust,ignore
//! use auditlog_testkit::arb;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     fn record_ids_are_never_empty(rec in arb::arb_canonical_record()) {
//!         assert!(!rec.id.is_empty());
//!     }
//! }
//! ```

pub mod arb;
pub mod fixtures;
pub mod schema;

pub use arb::{arb_audit_type, arb_canonical_record, arb_clean_text, arb_raw_entry};
pub use fixtures::{fixed_now, sample_configs, sample_entries};
pub use schema::{
    validate_run_config, validate_run_config_json, validate_run_receipt, validate_run_receipt_json,
};
