use std::rc::Rc;

use oxrdf::vocab::rdf;
use tracing::{trace, warn};

use crate::attributes::{Attribute, Element};
use crate::parser::ParseContext;
use crate::{Error, Store, Term, rdf_syntax, uri};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FrameId(usize);

/// What a frame stands for. Once set, it does not change.
#[derive(Clone, Debug)]
pub(crate) enum Role {
    /// A graph node: a resource, blank node, literal or collection.
    Node(Term),
    /// A property between the enclosing node and the node below.
    Arc(ArcRole),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ArcRole {
    /// Absent for the arcs joining a collection to its members.
    pub predicate: Option<Term>,
    /// `rdf:ID` of the property element, kept only when reifying.
    pub rdfid: Option<String>,
    /// Datatype for a literal object, unresolved.
    pub datatype: Option<String>,
}

/// Parsing context for one position in the tree.
pub(crate) struct Frame<'a, 'input> {
    pub parent: Option<FrameId>,
    /// `None` once another frame has taken over the element, or when
    /// the frame was synthesized.
    pub element: Option<Element<'a, 'input>>,
    /// Last child visited.
    pub cursor: Option<roxmltree::Node<'a, 'input>>,
    pub base: Rc<str>,
    pub lang: Rc<str>,
    pub role: Option<Role>,
    /// Next `rdf:li` number among this frame's children.
    pub list_index: u32,
}

impl Frame<'_, '_> {
    pub fn node(&self) -> Option<&Term> {
        match &self.role {
            Some(Role::Node(term)) => Some(term),
            _ => None,
        }
    }

    pub fn arc(&self) -> Option<&ArcRole> {
        match &self.role {
            Some(Role::Arc(arc)) => Some(arc),
            _ => None,
        }
    }

    pub fn arc_mut(&mut self) -> Option<&mut ArcRole> {
        match &mut self.role {
            Some(Role::Arc(arc)) => Some(arc),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.node().and_then(Term::as_collection).is_some()
    }
}

impl<'a, 'input, S: Store + ?Sized> ParseContext<'_, 'a, 'input, S> {
    pub(crate) fn frame(&self, id: FrameId) -> &Frame<'a, 'input> {
        &self.frames[id.0]
    }

    pub(crate) fn frame_mut(&mut self, id: FrameId) -> &mut Frame<'a, 'input> {
        &mut self.frames[id.0]
    }

    pub(crate) fn parent(&self, id: FrameId) -> Option<&Frame<'a, 'input>> {
        self.frame(id).parent.map(|p| self.frame(p))
    }

    /// The frame everything hangs from. It has no element and no role.
    pub(crate) fn top_frame(&mut self, base: &str) -> FrameId {
        self.frames.push(Frame {
            parent: None,
            element: None,
            cursor: None,
            base: base.into(),
            lang: "".into(),
            role: None,
            list_index: 1,
        });
        FrameId(self.frames.len() - 1)
    }

    /// A child frame inheriting `parent`'s context, taking over `element` as-is.
    fn push_frame(&mut self, parent: FrameId, element: Option<Element<'a, 'input>>) -> FrameId {
        let inherited = self.frame(parent);
        let frame = Frame {
            parent: Some(parent),
            element,
            cursor: None,
            base: inherited.base.clone(),
            lang: inherited.lang.clone(),
            role: None,
            list_index: 1,
        };
        self.frames.push(frame);
        FrameId(self.frames.len() - 1)
    }

    /// A frame for a tree node not seen before.
    ///
    /// `xml` attributes are stripped here: `xml:base` and `xml:lang` replace the
    /// inherited context as written, and namespace declarations are registered with the store.
    pub(crate) fn build_frame(
        &mut self,
        parent: FrameId,
        node: roxmltree::Node<'a, 'input>,
    ) -> Result<FrameId, Error> {
        let (element, declarations) = Element::new(node);

        for (prefix, ns) in declarations.prefixes {
            let ns = if self.base.is_empty() {
                ns.to_string()
            } else {
                uri::join(ns, self.base)?
            };
            self.store.set_prefix_for_uri(prefix, &ns)?;
        }

        let id = self.push_frame(parent, Some(element));
        if let Some(base) = declarations.base {
            self.frame_mut(id).base = base.into();
        }
        if let Some(lang) = declarations.lang {
            self.frame_mut(id).lang = lang.into();
        }

        Ok(id)
    }

    /// A child frame with no element of its own.
    pub(crate) fn build_child_frame(&mut self, parent: FrameId) -> FrameId {
        self.push_frame(parent, None)
    }

    /// A child frame that takes over `frame`'s element, keeping whatever
    /// attributes are left on it.
    pub(crate) fn reuse_element(&mut self, frame: FrameId) -> FrameId {
        let element = self.frame_mut(frame).element.take();
        self.push_frame(frame, element)
    }

    /// Removes `rdf:{name}` from the frame's element.
    pub(crate) fn take_rdf(&mut self, frame: FrameId, name: &str) -> Option<Attribute<'a>> {
        self.frame_mut(frame)
            .element
            .as_mut()
            .and_then(|e| e.take_rdf(name))
    }

    pub(crate) fn take_attributes(&mut self, frame: FrameId) -> Vec<Attribute<'a>> {
        self.frame_mut(frame)
            .element
            .as_mut()
            .map(Element::take_all)
            .unwrap_or_default()
    }

    pub(crate) fn has_attributes(&self, frame: FrameId) -> bool {
        self.frame(frame)
            .element
            .as_ref()
            .is_some_and(Element::has_attributes)
    }

    /// Resolves `uri` against the frame's base and gives the frame the resulting role.
    pub(crate) fn add_symbol(
        &mut self,
        frame: FrameId,
        uri: &str,
        role: impl FnOnce(Term) -> Role,
    ) -> Result<(), Error> {
        let resolved = uri::join(uri, &self.frame(frame).base)?;
        let term = self.store.sym(&resolved);
        self.frame_mut(frame).role = Some(role(term));
        Ok(())
    }

    pub(crate) fn add_node(&mut self, frame: FrameId, uri: &str) -> Result<(), Error> {
        self.add_symbol(frame, uri, Role::Node)?;
        self.load_if_ready(frame)
    }

    /// Blank nodes with the same `id` are the same node for the whole parse.
    pub(crate) fn add_bnode(&mut self, frame: FrameId, id: Option<&str>) -> Result<(), Error> {
        let term = match id {
            Some(id) => self
                .bnodes
                .entry(id.to_string())
                .or_insert_with(|| self.store.bnode(Some(id)))
                .clone(),
            None => self.store.bnode(None),
        };

        self.frame_mut(frame).role = Some(Role::Node(term));
        self.load_if_ready(frame)
    }

    pub(crate) fn add_collection(&mut self, frame: FrameId) -> Result<(), Error> {
        let collection = self.store.collection();
        self.frame_mut(frame).role = Some(Role::Node(Term::Collection(collection)));
        self.load_if_ready(frame)
    }

    pub(crate) fn add_collection_arc(&mut self, frame: FrameId) {
        self.frame_mut(frame).role = Some(Role::Arc(ArcRole::default()));
    }

    /// `rdf:li` is numbered using the parent's counter.
    pub(crate) fn add_arc(&mut self, frame: FrameId, uri: &str) -> Result<(), Error> {
        let numbered;
        let parent = self.frame(frame).parent;
        let uri = match parent {
            Some(parent) if uri == rdf_syntax::LI => {
                let parent = self.frame_mut(parent);
                numbered = format!("{}_{}", rdf_syntax::NS, parent.list_index);
                parent.list_index += 1;
                numbered.as_str()
            }
            _ => uri,
        };

        self.add_symbol(frame, uri, |predicate| {
            Role::Arc(ArcRole {
                predicate: Some(predicate),
                ..ArcRole::default()
            })
        })
    }

    /// A literal typed by the enclosing property, or else in the frame's language.
    pub(crate) fn add_literal(&mut self, frame: FrameId, value: &str) -> Result<(), Error> {
        let datatype = self
            .parent(frame)
            .and_then(Frame::arc)
            .and_then(|arc| arc.datatype.clone());

        let term = match datatype {
            Some(datatype) => {
                let datatype = self.store.sym(&datatype);
                self.store.literal(value, None, Some(&datatype))
            }
            None => {
                let lang = self.frame(frame).lang.clone();
                self.store
                    .literal(value, Some(&*lang).filter(|l| !l.is_empty()), None)
            }
        };

        self.frame_mut(frame).role = Some(Role::Node(term));
        self.load_if_ready(frame)
    }

    /// Called when the traversal leaves the frame for good.
    pub(crate) fn terminate_frame(&mut self, frame: FrameId) {
        if let Some(collection) = self.frame(frame).node().and_then(Term::as_collection) {
            self.store.close(collection);
        }
    }

    /// A node whose parent is an arc whose parent is a node completes a statement.
    pub(crate) fn is_triple_to_load(&self, frame: FrameId) -> bool {
        let this = self.frame(frame);
        let Some(parent) = this.parent.map(|p| self.frame(p)) else {
            return false;
        };
        let Some(grandparent) = parent.parent.map(|g| self.frame(g)) else {
            return false;
        };

        this.node().is_some() && parent.arc().is_some() && grandparent.node().is_some()
    }

    fn load_if_ready(&mut self, frame: FrameId) -> Result<(), Error> {
        if self.is_triple_to_load(frame) {
            self.load_triple(frame)?;
        }
        Ok(())
    }

    pub(crate) fn load_triple(&mut self, frame: FrameId) -> Result<(), Error> {
        let this = self.frame(frame);
        let (Some(object), Some(parent)) = (this.node().cloned(), this.parent) else {
            return Ok(());
        };
        let arc = self.frame(parent).arc().cloned().unwrap_or_default();
        let Some(subject) = self.parent(parent).and_then(Frame::node).cloned() else {
            return Ok(());
        };

        if let Some(collection) = subject.as_collection() {
            trace!("Appending {object} to {collection}");
            self.store.append(collection, object.clone());
        } else if let Some(predicate) = arc.predicate.clone() {
            trace!("Adding {subject} {predicate} {object}");
            self.store
                .add(subject.clone(), predicate, object.clone(), self.why);
        } else {
            warn!("No predicate between {subject} and {object}");
        }

        if let (Some(rdfid), Some(predicate)) = (arc.rdfid, arc.predicate) {
            let statement = uri::join(&format!("#{rdfid}"), &self.frame(frame).base)?;
            trace!("Reifying as <{statement}>");
            let statement = self.store.sym(&statement);

            let reification = [
                (rdf::TYPE, self.store.sym(rdf::STATEMENT.as_str())),
                (rdf::SUBJECT, subject),
                (rdf::PREDICATE, predicate),
                (rdf::OBJECT, object),
            ];
            for (property, value) in reification {
                let property = self.store.sym(property.as_str());
                self.store.add(statement.clone(), property, value, self.why);
            }
        }

        Ok(())
    }
}
