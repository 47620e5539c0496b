//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const FAILED: i32 = 1; // Malformed input or payload
pub const CONFIG_ERROR: i32 = 2; // Bad configuration or arguments
pub const UNTRUSTED: i32 = 4; // Signature rejected
pub const TRANSPORT_ERROR: i32 = 5; // Queue or certificate fetch failed
pub const DECRYPT_ERROR: i32 = 6; // Unknown key or cipher failure
