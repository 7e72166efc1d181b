//! Stable numeric error codes.
//!
//! Clients branch on these values, so they must never change across
//! releases.

/// Request body was not parseable JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Request envelope was structurally invalid.
pub const INVALID_REQUEST: i32 = -32600;
/// Method (or tool) name is not published.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params missing or of the wrong shape.
pub const INVALID_PARAMS: i32 = -32602;
/// Unexpected failure inside dispatch or the provider.
pub const INTERNAL_ERROR: i32 = -32603;
/// Provider refused the call due to rate limiting.
pub const RATE_LIMITED: i32 = -32000;
/// Referenced resource (including a stream session) does not exist.
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// Short classification string for a code, for logging.
pub fn kind_for_code(code: i32) -> &'static str {
    match code {
        PARSE_ERROR => "parse_error",
        INVALID_REQUEST => "invalid_request",
        METHOD_NOT_FOUND => "method_not_found",
        INVALID_PARAMS => "invalid_params",
        INTERNAL_ERROR => "internal_error",
        RATE_LIMITED => "rate_limited",
        RESOURCE_NOT_FOUND => "resource_not_found",
        _ => "unknown_error",
    }
}
