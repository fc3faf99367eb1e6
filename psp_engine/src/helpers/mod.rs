mod field_format;
mod signature;
mod time_range;

pub use field_format::{is_currency_code, is_region_code, is_url};
pub use signature::{compute_signature, signature_payload, verify_signature, SIGNATURE_FIELD};
pub use time_range::{day_end, day_start};
