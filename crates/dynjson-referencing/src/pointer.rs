use dynjson_value::Json;

use crate::Result;

/// Evaluate a JSON Pointer (RFC 6901) fragment against `root`.
///
/// The expression is split on `/`; empty segments (including the leading
/// one) are skipped; each segment unescapes `~1` to `/` and then `~0` to
/// `~`. Objects are traversed by key, arrays by decimal index. Traversal
/// into anything else, a missing key, or a bad index is an error. No
/// percent-decoding happens at this layer.
pub fn resolve_pointer(expr: &str, root: &Json) -> Result<Json> {
    Ok(root.pointer(expr)?)
}
