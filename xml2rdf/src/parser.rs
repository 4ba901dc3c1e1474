use std::collections::HashMap;

use itertools::Itertools;
use oxrdf::GraphName;
use oxrdf::vocab::rdf;
use tracing::{debug, trace};

use crate::attributes::qualified_name;
use crate::frame::{Frame, FrameId};
use crate::{Error, Store, Term, rdf_syntax, uri};

/// Parser configuration. Per-parse state lives elsewhere, so one parser
/// can be used for any number of documents.
#[derive(Clone, Debug, Default)]
pub struct RdfXmlParser {
    reify: bool,
}

impl RdfXmlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, every property element carrying `rdf:ID` also produces the
    /// four reification statements describing the statement it made.
    pub fn with_reification(mut self, reify: bool) -> Self {
        self.reify = reify;
        self
    }

    /// Parses the tree under `root` into `store`.
    ///
    /// `root` is either a document node, in which case its first element is used,
    /// or an element. Every statement is added with `why` as its context.
    pub fn parse<S: Store + ?Sized>(
        &self,
        root: roxmltree::Node,
        base: &str,
        why: GraphName,
        store: &mut S,
    ) -> Result<(), Error> {
        let root = if root.is_root() {
            root.first_element_child()
        } else {
            Some(root).filter(roxmltree::Node::is_element)
        };

        let Some(root) = root else {
            return Err(Error::NoRootElement {
                base: base.to_string(),
            });
        };

        debug!("Parsing RDF/XML with base <{base}> into {why}");

        let mut cx = ParseContext {
            store,
            why: &why,
            base,
            reify: self.reify,
            bnodes: HashMap::new(),
            frames: Vec::new(),
        };

        let top = cx.top_frame(base);
        let first = cx.build_frame(top, root)?;
        cx.run(first)?;

        debug!(
            "Finished parsing <{base}>: {} frames, {} blank node IDs",
            cx.frames.len(),
            cx.bnodes.len()
        );

        Ok(())
    }

    pub fn parse_document<S: Store + ?Sized>(
        &self,
        document: &roxmltree::Document,
        base: &str,
        why: GraphName,
        store: &mut S,
    ) -> Result<(), Error> {
        self.parse(document.root(), base, why, store)
    }

    /// Parses markup into a tree first. Document type declarations are allowed, so
    /// internal entities (like the customary `&rdf;`) can be used.
    pub fn parse_str<S: Store + ?Sized>(
        &self,
        input: &str,
        base: &str,
        why: GraphName,
        store: &mut S,
    ) -> Result<(), Error> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };

        let document = roxmltree::Document::parse_with_options(input, options).map_err(Error::Xml)?;
        self.parse_document(&document, base, why, store)
    }
}

/// State for a single parse.
pub(crate) struct ParseContext<'s, 'a, 'input, S: ?Sized> {
    pub store: &'s mut S,
    pub why: &'s GraphName,
    /// The base given to the parser, as opposed to the base of any one frame.
    pub base: &'s str,
    pub reify: bool,
    pub bnodes: HashMap<String, Term>,
    pub frames: Vec<Frame<'a, 'input>>,
}

impl<'a, 'input, S: Store + ?Sized> ParseContext<'_, 'a, 'input, S> {
    fn run(&mut self, mut frame: FrameId) -> Result<(), Error> {
        // whether to descend into the current frame's children
        let mut dig = true;

        while self.frame(frame).parent.is_some() {
            frame = self.process(frame, &mut dig)?;

            match self.next_frame(frame, &mut dig)? {
                Some(next) => frame = next,
                None => break,
            }
        }

        Ok(())
    }

    /// Finds the next tree node to visit and builds a frame for it, retiring
    /// every frame that has nothing left to visit on the way.
    fn next_frame(&mut self, mut frame: FrameId, dig: &mut bool) -> Result<Option<FrameId>, Error> {
        loop {
            let Some(parent) = self.frame(frame).parent else {
                return Ok(None);
            };

            let Some(node) = self.frame(frame).element.as_ref().map(|e| e.node) else {
                // the element was handed to a child, which has already been visited
                self.terminate_frame(frame);
                frame = parent;
                continue;
            };

            let candidate = match self.frame(frame).cursor {
                None => node.first_child(),
                Some(last) => last.next_sibling(),
            };

            let candidate = match candidate {
                Some(candidate) if *dig => candidate,
                _ => {
                    self.terminate_frame(frame);
                    frame = parent;
                    *dig = true;
                    continue;
                }
            };

            self.frame_mut(frame).cursor = Some(candidate);

            // text only counts when it is all there is
            let only_child = node.first_child() == node.last_child();
            if candidate.is_element() || (candidate.is_text() && only_child) {
                return self.build_frame(frame, candidate).map(Some);
            }
        }
    }

    /// Classifies the frame's tree node and emits what it can.
    ///
    /// Returns the frame the traversal continues from, which is a descendant
    /// of `frame` when the element gave rise to more than one frame.
    fn process(&mut self, frame: FrameId, dig: &mut bool) -> Result<FrameId, Error> {
        let Some(node) = self.frame(frame).element.as_ref().map(|e| e.node) else {
            return Ok(frame);
        };

        if node.is_text() {
            self.add_literal(frame, node.text().unwrap_or_default())?;
            return Ok(frame);
        }

        let name = qualified_name(node, &self.frame(frame).base)?;
        if name == rdf_syntax::RDF {
            trace!("Skipping <{name}> wrapper");
            return Ok(frame);
        }

        let mut frame = frame;
        if self.parent(frame).is_some_and(Frame::is_collection) {
            // members hang off an anonymous arc so that they are in node position
            self.add_collection_arc(frame);
            frame = self.reuse_element(frame);
        }

        let in_node_position = self
            .parent(frame)
            .is_none_or(|parent| parent.role.is_none() || parent.arc().is_some());

        if in_node_position {
            self.process_node_element(frame, node, &name)?;
            Ok(frame)
        } else {
            self.process_property_element(frame, node, &name, dig)
        }
    }

    fn process_node_element(
        &mut self,
        frame: FrameId,
        node: roxmltree::Node,
        name: &str,
    ) -> Result<(), Error> {
        let about = self.take_rdf(frame, rdf_syntax::ABOUT);
        let id = self.take_rdf(frame, rdf_syntax::ID);

        match (about, id) {
            (Some(_), Some(_)) => {
                return Err(Error::AmbiguousNodeId {
                    element: prefixed_name(node),
                });
            }
            (Some(about), None) => self.add_node(frame, about.value)?,
            (None, Some(id)) => self.add_node(frame, &format!("#{}", id.value))?,
            (None, None) => {
                let node_id = self.take_rdf(frame, rdf_syntax::NODE_ID);
                self.add_bnode(frame, node_id.map(|a| a.value))?;
            }
        }

        let Some(subject) = self.frame(frame).node().cloned() else {
            return Ok(());
        };

        trace!("Node element <{name}> is {subject}");

        // a typed node element is its own type; an `rdf:type` attribute on it is ignored
        let class = if name == rdf_syntax::DESCRIPTION {
            self.take_rdf(frame, rdf_syntax::TYPE).map(|a| a.value)
        } else {
            Some(name)
        };
        if let Some(class) = class {
            let class = uri::join(class, &self.frame(frame).base)?;
            let class = self.store.sym(&class);
            let property = self.store.sym(rdf::TYPE.as_str());
            self.store.add(subject.clone(), property, class, self.why);
        }

        let lang = self.frame(frame).lang.clone();
        let base = self.frame(frame).base.clone();
        let (syntax, properties): (Vec<_>, Vec<_>) = self
            .take_attributes(frame)
            .into_iter()
            .rev()
            .partition(|attr| attr.is_rdf());

        if !syntax.is_empty() {
            trace!(
                "Ignoring attributes on node element: {}",
                syntax.iter().map(|a| a.name).join(" ")
            );
        }

        for attr in properties {
            let property = attr.qualified_name(&base)?;
            let property = self.store.sym(&property);
            let value = self
                .store
                .literal(attr.value, Some(&*lang).filter(|l| !l.is_empty()), None);
            self.store.add(subject.clone(), property, value, self.why);
        }

        Ok(())
    }

    fn process_property_element(
        &mut self,
        frame: FrameId,
        node: roxmltree::Node,
        name: &str,
        dig: &mut bool,
    ) -> Result<FrameId, Error> {
        self.add_arc(frame, name)?;

        // without reification, `rdf:ID` is left to be read as a property attribute
        let rdfid = if self.reify {
            self.take_rdf(frame, rdf_syntax::ID)
        } else {
            None
        };
        let datatype = self.take_rdf(frame, rdf_syntax::DATATYPE);
        let parse_type = self.take_rdf(frame, rdf_syntax::PARSE_TYPE);

        if let Some(arc) = self.frame_mut(frame).arc_mut() {
            arc.rdfid = rdfid.map(|a| a.value.to_string());
            arc.datatype = datatype.map(|a| a.value.to_string());
        }

        trace!(
            "Property element <{name}>{}",
            parse_type.map(|a| format!(" parseType={}", a.value)).unwrap_or_default()
        );

        match parse_type.map(|a| a.value) {
            Some("Literal") => {
                if let Some(arc) = self.frame_mut(frame).arc_mut() {
                    arc.datatype = Some(rdf::XML_LITERAL.as_str().to_string());
                }

                let child = self.build_child_frame(frame);
                self.add_literal(child, inner_markup(node))?;
                *dig = false;
                Ok(child)
            }
            Some("Resource") => {
                let child = self.reuse_element(frame);
                self.add_bnode(child, None)?;
                Ok(child)
            }
            Some("Collection") => {
                let child = self.reuse_element(frame);
                self.add_collection(child)?;
                Ok(child)
            }
            _ if self.has_attributes(frame) => self.process_property_attributes(frame),
            _ if !node.has_children() => {
                let child = self.build_child_frame(frame);
                self.add_literal(child, "")?;
                Ok(child)
            }
            _ => Ok(frame),
        }
    }

    /// A property element with attributes describes its object right there:
    /// the object is named by `rdf:resource` or `rdf:nodeID` (or is a fresh blank
    /// node) and every other attribute is a property of it.
    fn process_property_attributes(&mut self, frame: FrameId) -> Result<FrameId, Error> {
        let resource = self.take_rdf(frame, rdf_syntax::RESOURCE);
        let node_id = self.take_rdf(frame, rdf_syntax::NODE_ID);

        let object = self.build_child_frame(frame);
        match (resource, node_id) {
            (Some(resource), _) => self.add_node(object, resource.value)?,
            (None, node_id) => self.add_bnode(object, node_id.map(|a| a.value))?,
        }

        let base = self.frame(frame).base.clone();
        for attr in self.take_attributes(frame).into_iter().rev() {
            let property = attr.qualified_name(&base)?;

            let arc = self.build_child_frame(object);
            self.add_arc(arc, &property)?;

            let value = self.build_child_frame(arc);
            if property == rdf::TYPE.as_str() {
                self.add_node(value, attr.value)?;
            } else {
                self.add_literal(value, attr.value)?;
            }
        }

        Ok(object)
    }
}

/// The markup between an element's tags, exactly as written.
fn inner_markup<'input>(node: roxmltree::Node<'_, 'input>) -> &'input str {
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => node
            .document()
            .input_text()
            .get(first.range().start..last.range().end)
            .unwrap_or_default(),
        _ => "",
    }
}

/// The element's name as written, e.g. `rdf:Description`.
fn prefixed_name(node: roxmltree::Node) -> String {
    let tag = node.tag_name();
    match tag.namespace().and_then(|ns| node.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", tag.name()),
        _ => tag.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn literal_content_is_kept_verbatim() {
        let doc = roxmltree::Document::parse(r#"<p>some <b xmlns="http://x/">bold</b> text</p>"#)
            .unwrap();
        assert_eq!(
            inner_markup(doc.root_element()),
            r#"some <b xmlns="http://x/">bold</b> text"#
        );
    }

    #[test]
    fn empty_element_has_no_markup() {
        let doc = roxmltree::Document::parse("<p/>").unwrap();
        assert_eq!(inner_markup(doc.root_element()), "");
    }

    #[test]
    fn prefixed_names() {
        let doc = roxmltree::Document::parse(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><x xmlns="http://x/"/></rdf:RDF>"#,
        )
        .unwrap();
        assert_eq!(prefixed_name(doc.root_element()), "rdf:RDF");
        assert_eq!(
            prefixed_name(doc.root_element().first_element_child().unwrap()),
            "x"
        );
    }
}
