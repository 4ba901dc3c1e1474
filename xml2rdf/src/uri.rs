//! Reference resolution.
//!
//! This is *not* RFC 3986 resolution. RDF/XML documents in the wild were produced
//! against a much simpler joining algorithm, and statement identities depend on
//! reproducing its quirks exactly (most notably the approximate `..` collapsing).

use std::ops::Range;

use crate::Error;

/// Resolves `reference` against `base`.
///
/// Fails with [`Error::InvalidBase`] only when the base must be split into
/// scheme and path but has no `:` in it.
pub fn join(reference: &str, base: &str) -> Result<String, Error> {
    // a fragment on the base is dropped, unless the base is nothing but a fragment
    let base = match base.find('#') {
        Some(hash) if hash > 0 => &base[..hash],
        _ => base,
    };

    if reference.is_empty() {
        return Ok(base.to_string());
    }

    if reference.starts_with('#') {
        return Ok(format!("{base}{reference}"));
    }

    // absolute references override the base entirely
    if reference.contains(':') {
        return Ok(reference.to_string());
    }

    if base.is_empty() {
        return Ok(reference.to_string());
    }

    let Some(colon) = base.find(':') else {
        return Err(Error::InvalidBase {
            base: base.to_string(),
        });
    };

    // e.g. "http:"
    let scheme = &base[..=colon];
    if reference.starts_with("//") {
        return Ok(format!("{scheme}{reference}"));
    }

    let has_authority = base[colon + 1..].starts_with("//");
    let path_search_start = if has_authority { colon + 3 } else { colon + 1 };

    let path_start = base
        .get(path_search_start..)
        .and_then(|rest| rest.find('/'))
        .map(|offset| path_search_start + offset);

    let Some(path_start) = path_start else {
        return Ok(if base.len() > path_search_start {
            format!("{base}/{reference}")
        } else {
            format!("{scheme}{reference}")
        });
    };

    let prefix = &base[..path_start];
    if reference.starts_with('/') {
        return Ok(format!("{prefix}{reference}"));
    }

    let mut path = base[path_start..].to_string();
    // path always starts with '/' so there is a last slash;
    // chop the trailing filename
    if let Some(last_slash) = path.rfind('/') {
        path.truncate(last_slash + 1);
    }

    path.push_str(reference);

    while let Some(range) = parent_segment(&path) {
        path.replace_range(range, "");
    }

    let mut path = path.replace("./", "");
    if path.ends_with("/.") {
        path.pop();
    }

    Ok(format!("{prefix}{path}"))
}

/// Finds the leftmost `segment/../` in `path`, where `segment` is a (possibly empty)
/// run of non-slash characters.
///
/// A leading `/../` matches with an empty segment, so it is removed together with
/// the slash that precedes it.
fn parent_segment(path: &str) -> Option<Range<usize>> {
    let up = path.find("/../")?;
    let start = path[..up].rfind('/').map_or(0, |slash| slash + 1);
    Some(start..up + "/../".len())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", "http://a/b/c", "http://a/b/c")]
    #[case("#frag", "http://a/b/c", "http://a/b/c#frag")]
    #[case("d/e", "http://a/b/c", "http://a/b/d/e")]
    #[case("/x", "http://a/b/c", "http://a/x")]
    #[case("//other/x", "http://a/b/c", "http://other/x")]
    #[case("d", "http://a/b/c#frag", "http://a/b/d")]
    #[case("", "http://a/b/c#frag", "http://a/b/c")]
    #[case("#x", "#base", "#base#x")]
    #[case("../d", "http://a/b/c", "http://a/d")]
    #[case("../../d", "http://a/b/c/e", "http://a/d")]
    #[case("./d", "http://a/b/c", "http://a/b/d")]
    #[case(".", "http://a/b/c", "http://a/b/")]
    #[case("d/.", "http://a/b/c", "http://a/b/d/")]
    #[case("d", "http://a/b/", "http://a/b/d")]
    #[case("d", "http://a", "http://a/d")]
    #[case("d", "http://", "http:d")]
    #[case("d", "urn:x", "urn:x/d")]
    #[case("d", "urn:", "urn:d")]
    #[case("d", "file:/tmp/x.rdf", "file:/tmp/d")]
    #[case("relative", "", "relative")]
    fn resolves(#[case] reference: &str, #[case] base: &str, #[case] expected: &str) {
        assert_eq!(join(reference, base).unwrap(), expected);
    }

    #[rstest]
    #[case("http://example.org/x", "http://a/b/c")]
    #[case("mailto:someone@example.org", "")]
    #[case("urn:isbn:0451450523", "no-colon-here")]
    #[case("a:b", "http://a/b/c#f")]
    fn absolute_references_override_base(#[case] reference: &str, #[case] base: &str) {
        assert_eq!(join(reference, base).unwrap(), reference);
    }

    #[test]
    fn base_without_scheme_is_rejected() {
        let err = join("x", "nobase").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid base URI <nobase>: no scheme delimiter");
    }

    #[test]
    fn leading_parent_segment_is_collapsed_against_the_slash() {
        // "/../x" has no segment before the "..", the legacy algorithm eats the slash anyway
        assert_eq!(join("../x", "http://a/b").unwrap(), "http://ax");
    }

    #[test]
    fn dot_slash_is_removed_everywhere() {
        assert_eq!(join("a./b", "http://h/p/").unwrap(), "http://h/p/ab");
    }

    #[rstest]
    #[case("d/e")]
    #[case("../d")]
    #[case("./d")]
    #[case("/x")]
    #[case("//other/x")]
    #[case("#frag")]
    #[case("d?q=1")]
    fn agrees_with_rfc3986_for_ordinary_references(#[case] reference: &str) {
        let base = "http://a/b/c";
        let expected = oxiri::Iri::parse(base.to_string())
            .unwrap()
            .resolve(reference)
            .unwrap();
        assert_eq!(join(reference, base).unwrap(), expected.as_str());
    }
}
