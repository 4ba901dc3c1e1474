use crate::{Error, rdf_syntax, xml_ns};

/// An attribute that has not been consumed yet.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Attribute<'a> {
    pub namespace: Option<&'a str>,
    pub name: &'a str,
    pub value: &'a str,
}

impl Attribute<'_> {
    pub fn is_rdf(&self) -> bool {
        self.namespace == Some(rdf_syntax::NS)
    }

    pub fn qualified_name(&self, base: &str) -> Result<String, Error> {
        qualified(self.namespace, self.name, base)
    }
}

/// The qualified name of an element: its namespace URI followed by its local name.
pub(crate) fn qualified_name(node: roxmltree::Node, base: &str) -> Result<String, Error> {
    qualified(node.tag_name().namespace(), node.tag_name().name(), base)
}

fn qualified(namespace: Option<&str>, name: &str, base: &str) -> Result<String, Error> {
    match namespace {
        Some(ns) => Ok(format!("{ns}{name}")),
        None => Err(Error::MissingNamespace {
            name: name.to_string(),
            base: base.to_string(),
        }),
    }
}

/// What an element declares about its own scope, gathered while its
/// `xml` attributes are stripped.
#[derive(Debug, Default)]
pub(crate) struct Declarations<'a> {
    pub base: Option<&'a str>,
    pub lang: Option<&'a str>,
    /// `xmlns:prefix="uri"` declarations made on this element (not inherited ones).
    pub prefixes: Vec<(&'a str, &'a str)>,
}

/// A tree node together with the attributes that are still to be processed.
///
/// The XML tree itself is never modified; consuming an attribute removes it from here.
pub(crate) struct Element<'a, 'input> {
    pub node: roxmltree::Node<'a, 'input>,
    attributes: Vec<Attribute<'a>>,
}

impl<'a, 'input> Element<'a, 'input> {
    /// Builds the element, stripping every attribute in the reserved `xml` stem.
    pub fn new(node: roxmltree::Node<'a, 'input>) -> (Self, Declarations<'a>) {
        let mut declarations = Declarations::default();
        let mut attributes = Vec::new();

        if node.is_element() {
            for attr in node.attributes() {
                match attr.namespace() {
                    Some(xml_ns::NS) => match attr.name() {
                        "base" => declarations.base = Some(attr.value()),
                        "lang" => declarations.lang = Some(attr.value()),
                        _ => {}
                    },
                    None if attr.name().starts_with("xml") => {}
                    Some(ns) if written_prefix(node, ns).starts_with("xml") => {}
                    namespace => attributes.push(Attribute {
                        namespace,
                        name: attr.name(),
                        value: attr.value(),
                    }),
                }
            }

            declarations.prefixes = declared_prefixes(node);
        }

        (Self { node, attributes }, declarations)
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Removes and returns the attribute `rdf:{name}`, if present.
    pub fn take_rdf(&mut self, name: &str) -> Option<Attribute<'a>> {
        let ix = self
            .attributes
            .iter()
            .position(|attr| attr.is_rdf() && attr.name == name)?;
        Some(self.attributes.remove(ix))
    }

    /// Removes and returns all remaining attributes.
    pub fn take_all(&mut self) -> Vec<Attribute<'a>> {
        std::mem::take(&mut self.attributes)
    }
}

fn written_prefix<'input>(node: roxmltree::Node<'_, 'input>, namespace: &str) -> &'input str {
    node.lookup_prefix(namespace).unwrap_or_default()
}

/// `xmlns:prefix` declarations written on this element, in the order they appear.
///
/// The tree only reports which namespaces are in scope, so the start tag is read
/// from the source to tell a re-declaration apart from an inherited binding.
fn declared_prefixes<'a>(node: roxmltree::Node<'a, '_>) -> Vec<(&'a str, &'a str)> {
    let Some(tag) = node.document().input_text().get(node.range()) else {
        return Vec::new();
    };

    attribute_names(tag)
        .into_iter()
        .filter_map(|name| name.strip_prefix("xmlns:"))
        // `xml` is bound implicitly
        .filter(|prefix| *prefix != "xml")
        .filter_map(|prefix| {
            node.namespaces()
                .find(|ns| ns.name() == Some(prefix))
                .and_then(|ns| Some((ns.name()?, ns.uri())))
        })
        .collect()
}

/// Attribute names as written in the start tag at the beginning of `markup`.
fn attribute_names(markup: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut quote = None;
    // the name being read, or the last one read
    let mut token: Option<(usize, usize)> = None;
    let mut in_token = false;

    for (ix, c) in markup.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                token = None;
                in_token = false;
            }
            '=' => {
                if let Some((start, end)) = token.take() {
                    names.push(&markup[start..end]);
                }
                in_token = false;
            }
            '>' => break,
            c if c.is_whitespace() || c == '<' || c == '/' => in_token = false,
            c => {
                let end = ix + c.len_utf8();
                match &mut token {
                    Some((_, token_end)) if in_token => *token_end = end,
                    _ => token = Some((ix, end)),
                }
                in_token = true;
            }
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DOC: &str = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
        xmlns:ex="http://example.org/">
        <rdf:Description rdf:about="a" xml:lang="en" xml:base="http://b/" xmlfoo="x"
            xmlns:other="http://other/" ex:p="v" />
    </rdf:RDF>"#;

    #[test]
    fn xml_attributes_are_stripped() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let description = doc.root_element().first_element_child().unwrap();
        let (mut element, declarations) = Element::new(description);

        assert_eq!(declarations.base, Some("http://b/"));
        assert_eq!(declarations.lang, Some("en"));
        assert_eq!(declarations.prefixes, vec![("other", "http://other/")]);

        let names: Vec<_> = element.take_all().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["about", "p"]);
    }

    #[test]
    fn root_declarations_skip_xml_prefix() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let (_, declarations) = Element::new(doc.root_element());

        let mut prefixes = declarations.prefixes;
        prefixes.sort();
        assert_eq!(
            prefixes,
            vec![
                ("ex", "http://example.org/"),
                ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ]
        );
    }

    #[test]
    fn rdf_attributes_are_consumed_once() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let description = doc.root_element().first_element_child().unwrap();
        let (mut element, _) = Element::new(description);

        assert_eq!(element.take_rdf("about").map(|a| a.value), Some("a"));
        assert!(element.take_rdf("about").is_none());
        assert!(element.has_attributes());
    }

    #[test]
    fn repeated_declarations_are_reported() {
        let doc = roxmltree::Document::parse(
            r#"<a xmlns:ex="http://example.org/"><b xmlns:ex="http://example.org/" xmlns:new='http://new/'/></a>"#,
        )
        .unwrap();
        let b = doc.root_element().first_element_child().unwrap();
        let (_, declarations) = Element::new(b);

        assert_eq!(
            declarations.prefixes,
            vec![("ex", "http://example.org/"), ("new", "http://new/")]
        );
    }

    #[test]
    fn attribute_names_skip_quoted_text() {
        assert_eq!(
            attribute_names(r#"<x a="xmlns:no='1'" b = 'c>d' xmlns:p="u"/><y z="1"/>"#),
            vec!["a", "b", "xmlns:p"]
        );
    }

    #[test]
    fn prefixes_starting_with_xml_are_stripped() {
        let doc = roxmltree::Document::parse(
            r#"<x xmlns:xmlfoo="http://foo/" xmlns:ex="http://example.org/" xmlfoo:bar="1" ex:baz="2"/>"#,
        )
        .unwrap();
        let (mut element, declarations) = Element::new(doc.root_element());

        let names: Vec<_> = element.take_all().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["baz"]);
        assert_eq!(
            declarations.prefixes,
            vec![("xmlfoo", "http://foo/"), ("ex", "http://example.org/")]
        );
    }

    #[test]
    fn unqualified_names_have_no_namespace() {
        let doc = roxmltree::Document::parse("<root/>").unwrap();
        let err = qualified_name(doc.root_element(), "http://base/").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"RDF/XML syntax error: no namespace for `root` in <http://base/>");
    }
}
