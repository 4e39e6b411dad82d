//! Base-URI composition for `$ref` targets.

use fluent_uri::{Uri, UriRef};

use crate::{Error, Result};

/// Parse an absolute URI.
pub fn parse_uri(input: &str) -> Result<Uri<String>> {
    Uri::parse(input.to_owned()).map_err(|e| Error::InvalidUri {
        uri: input.to_string(),
        reason: e.to_string(),
    })
}

/// Make `reference` absolute against an optional base.
///
/// - An already absolute reference is used as-is.
/// - When the base has an authority, the reference is grafted onto it:
///   a reference starting with `/` replaces the path, one starting with
///   `#` keeps the path and attaches the fragment, anything else replaces
///   the last path segment.
/// - A base without an authority uses standard RFC 3986 relative
///   resolution.
/// - Without a base the reference must be absolute.
pub fn make_absolute(base: Option<&Uri<String>>, reference: &str) -> Result<Uri<String>> {
    if let Ok(absolute) = Uri::parse(reference.to_owned()) {
        return Ok(absolute);
    }
    let Some(base) = base else {
        return Err(Error::NoBase {
            reference: reference.to_string(),
        });
    };
    if let Some(authority) = base.authority() {
        let mut composed = String::new();
        composed.push_str(base.scheme().as_str());
        composed.push_str("://");
        composed.push_str(authority.as_str());
        if !reference.starts_with('/') {
            if reference.starts_with('#') {
                composed.push_str(base.path().as_str());
            } else {
                let path = base.path().as_str();
                match path.rfind('/') {
                    Some(i) => composed.push_str(&path[..i]),
                    None => composed.push_str(path),
                }
                composed.push('/');
            }
        }
        composed.push_str(reference);
        parse_uri(&composed)
    } else {
        let relative = UriRef::parse(reference).map_err(|e| Error::InvalidUri {
            uri: reference.to_string(),
            reason: e.to_string(),
        })?;
        relative.resolve_against(base).map_err(|e| Error::InvalidUri {
            uri: reference.to_string(),
            reason: e.to_string(),
        })
    }
}

/// The document identity of a URI: scheme, authority and path with the
/// fragment stripped. This is the registry key, so a `$ref` into an
/// already-seen document never refetches it.
pub fn doc_uri(uri: &Uri<String>) -> String {
    match uri.authority() {
        Some(authority) => format!(
            "{}://{}{}",
            uri.scheme().as_str(),
            authority.as_str(),
            uri.path().as_str()
        ),
        None => format!("{}:{}", uri.scheme().as_str(), uri.path().as_str()),
    }
}

/// Whether two URIs denote the same document (fragment excluded).
pub fn same_document(a: &Uri<String>, b: &Uri<String>) -> bool {
    a.scheme().as_str().eq_ignore_ascii_case(b.scheme().as_str())
        && a.authority().map(|auth| auth.as_str()) == b.authority().map(|auth| auth.as_str())
        && a.path().as_str() == b.path().as_str()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(
        Some("http://host/a/b.json"), "http://other/c.json", "http://other/c.json";
        "absolute reference wins"
    )]
    #[test_case(
        Some("http://host/a/b.json"), "/root.json", "http://host/root.json";
        "leading slash replaces path"
    )]
    #[test_case(
        Some("http://host/a/b.json"), "#/definitions/x", "http://host/a/b.json#/definitions/x";
        "fragment keeps path"
    )]
    #[test_case(
        Some("http://host/a/b.json"), "peer.json", "http://host/a/peer.json";
        "relative replaces last segment"
    )]
    #[test_case(
        Some("urn:t"), "#/properties/child", "urn:t#/properties/child";
        "no authority uses standard resolution"
    )]
    #[test_case(None, "urn:t", "urn:t"; "no base absolute reference")]
    fn composition(base: Option<&str>, reference: &str, expected: &str) {
        let base = base.map(|b| parse_uri(b).unwrap());
        let resolved = make_absolute(base.as_ref(), reference).unwrap();
        assert_eq!(resolved.to_string(), expected);
    }

    #[test]
    fn relative_without_base_fails() {
        assert!(matches!(
            make_absolute(None, "peer.json"),
            Err(Error::NoBase { .. })
        ));
    }

    #[test_case("http://host/a/b.json#/x", "http://host/a/b.json"; "fragment stripped")]
    #[test_case("urn:t#/x", "urn:t"; "opaque uri")]
    fn doc_uri_strips_fragment(input: &str, expected: &str) {
        assert_eq!(doc_uri(&parse_uri(input).unwrap()), expected);
    }

    #[test]
    fn document_identity() {
        let a = parse_uri("http://host/doc.json#/one").unwrap();
        let b = parse_uri("http://host/doc.json#/two").unwrap();
        let c = parse_uri("http://host/other.json").unwrap();
        assert!(same_document(&a, &b));
        assert!(!same_document(&a, &c));
        let u1 = parse_uri("urn:t").unwrap();
        let u2 = parse_uri("urn:t#/properties/child").unwrap();
        assert!(same_document(&u1, &u2));
    }
}
