//! Domain logic: normalization of raw change-log entries.
//!
//! This crate is designed to be I/O-free and highly testable.

pub mod age;
pub mod legacy;
pub mod normalize;
pub mod sanitize;

pub use age::{MILLIS_PER_DAY, age_days, parse_change_instant, parse_change_instant_in};
pub use legacy::{
    LEGACY_FIELD_COUNT, LegacyDecodeError, decode_legacy_batch, decode_legacy_key,
    encode_legacy_batch, encode_legacy_key,
};
pub use normalize::{FieldSource, NormalizationError, normalize, normalize_in};
pub use sanitize::{clean_text, strip_delimiter};
