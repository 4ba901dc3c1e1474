use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use oxrdf::vocab::rdf;
use oxrdf::{GraphName, NamedNode, NamedOrBlankNode};
use tracing::{debug, warn};

use crate::Error;

/// Identifies a collection owned by a [`Store`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub usize);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A graph term as seen by the parser.
///
/// Collections are first-class here: the parser appends members to them
/// in document order and never produces `rdf:first`/`rdf:rest` statements itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    NamedNode(NamedNode),
    BlankNode(oxrdf::BlankNode),
    Literal(oxrdf::Literal),
    Collection(CollectionId),
}

impl Term {
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            Term::NamedNode(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&oxrdf::Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn as_collection(&self) -> Option<CollectionId> {
        match self {
            Term::Collection(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(n) => n.fmt(f),
            Term::BlankNode(b) => b.fmt(f),
            Term::Literal(l) => l.fmt(f),
            Term::Collection(c) => write!(f, "( {c} )"),
        }
    }
}

impl From<NamedNode> for Term {
    fn from(value: NamedNode) -> Self {
        Term::NamedNode(value)
    }
}

impl From<oxrdf::BlankNode> for Term {
    fn from(value: oxrdf::BlankNode) -> Self {
        Term::BlankNode(value)
    }
}

impl From<oxrdf::Literal> for Term {
    fn from(value: oxrdf::Literal) -> Self {
        Term::Literal(value)
    }
}

/// The receiving end of the parser.
///
/// A store creates terms on request and records statements. It also owns the
/// prefix bindings declared by documents; these are unique for the life of the store.
pub trait Store {
    fn sym(&mut self, uri: &str) -> Term;

    /// A literal with either a datatype or a language. When both are given, the
    /// datatype wins.
    fn literal(&mut self, value: &str, lang: Option<&str>, datatype: Option<&Term>) -> Term;

    /// A blank node. The parser interns identified blank nodes itself, so `id` is
    /// only a hint.
    fn bnode(&mut self, id: Option<&str>) -> Term;

    fn collection(&mut self) -> CollectionId;

    fn append(&mut self, collection: CollectionId, member: Term);

    /// No further members will be appended.
    fn close(&mut self, collection: CollectionId);

    fn add(&mut self, subject: Term, predicate: Term, object: Term, why: &GraphName);

    /// Binds `prefix` to `uri`. Fails with [`Error::DuplicatePrefix`] if the prefix
    /// is already bound, even to the same URI.
    fn set_prefix_for_uri(&mut self, prefix: &str, uri: &str) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub why: GraphName,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if !self.why.is_default_graph() {
            write!(f, " {}", self.why)?;
        }
        write!(f, " .")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Collection {
    members: Vec<Term>,
    closed: bool,
}

impl Collection {
    pub fn members(&self) -> &[Term] {
        &self.members
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Keeps everything in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    statements: Vec<Statement>,
    collections: Vec<Collection>,
    namespaces: IndexMap<String, String>,
    next_bnode: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(id.0)
    }

    pub fn collections(&self) -> impl Iterator<Item = (CollectionId, &Collection)> {
        self.collections
            .iter()
            .enumerate()
            .map(|(ix, c)| (CollectionId(ix), c))
    }

    /// Prefix bindings, in the order they were declared.
    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    /// All statements as a graph, ignoring their context.
    ///
    /// Collections become `rdf:first`/`rdf:rest` lists.
    pub fn to_graph(&self) -> oxrdf::Graph {
        let mut graph = oxrdf::Graph::new();
        for triple in self.triples() {
            graph.insert(&triple);
        }
        graph
    }

    /// All statements as a dataset, using each statement's context as its graph name.
    ///
    /// List statements are placed in the graph of the first statement that
    /// mentions the collection, or the default graph if none does.
    pub fn to_dataset(&self) -> oxrdf::Dataset {
        let mut dataset = oxrdf::Dataset::new();
        let mut list_graphs = vec![None; self.collections.len()];
        for statement in &self.statements {
            for term in [&statement.subject, &statement.object] {
                if let Some(slot) = term.as_collection().and_then(|c| list_graphs.get_mut(c.0)) {
                    slot.get_or_insert_with(|| statement.why.clone());
                }
            }
        }

        for statement in &self.statements {
            if let Some(triple) = self.to_triple(statement) {
                dataset.insert(&triple.in_graph(statement.why.clone()));
            }
        }

        for (id, graph_name) in list_graphs.into_iter().enumerate() {
            let graph_name = graph_name.unwrap_or(GraphName::DefaultGraph);
            for triple in self.list_triples(CollectionId(id)) {
                dataset.insert(&triple.in_graph(graph_name.clone()));
            }
        }

        dataset
    }

    fn triples(&self) -> impl Iterator<Item = oxrdf::Triple> + '_ {
        self.statements
            .iter()
            .filter_map(|s| self.to_triple(s))
            .chain((0..self.collections.len()).flat_map(|id| self.list_triples(CollectionId(id))))
    }

    fn to_triple(&self, statement: &Statement) -> Option<oxrdf::Triple> {
        let Some(subject) = self.subject_term(&statement.subject) else {
            warn!("Skipping statement with non-resource subject: {statement}");
            return None;
        };

        let Some(predicate) = statement.predicate.as_named_node() else {
            warn!("Skipping statement with non-IRI predicate: {statement}");
            return None;
        };

        Some(oxrdf::Triple::new(
            subject,
            predicate.clone(),
            self.object_term(&statement.object),
        ))
    }

    fn list_head(&self, id: CollectionId) -> NamedOrBlankNode {
        match self.collections.get(id.0) {
            Some(c) if !c.members.is_empty() => list_node(id, 0).into(),
            _ => rdf::NIL.into_owned().into(),
        }
    }

    fn list_triples(&self, id: CollectionId) -> Vec<oxrdf::Triple> {
        let Some(collection) = self.collections.get(id.0) else {
            return Vec::new();
        };

        let len = collection.members.len();
        let mut triples = Vec::with_capacity(len * 2);
        for (ix, member) in collection.members.iter().enumerate() {
            let node = list_node(id, ix);
            triples.push(oxrdf::Triple::new(
                node.clone(),
                rdf::FIRST,
                self.object_term(member),
            ));
            let rest: NamedOrBlankNode = if ix + 1 < len {
                list_node(id, ix + 1).into()
            } else {
                rdf::NIL.into_owned().into()
            };
            triples.push(oxrdf::Triple::new(node, rdf::REST, rest));
        }

        triples
    }

    fn subject_term(&self, term: &Term) -> Option<NamedOrBlankNode> {
        match term {
            Term::NamedNode(n) => Some(n.clone().into()),
            Term::BlankNode(b) => Some(b.clone().into()),
            Term::Collection(c) => Some(self.list_head(*c)),
            Term::Literal(_) => None,
        }
    }

    fn object_term(&self, term: &Term) -> oxrdf::Term {
        match term {
            Term::NamedNode(n) => n.clone().into(),
            Term::BlankNode(b) => b.clone().into(),
            Term::Literal(l) => l.clone().into(),
            Term::Collection(c) => self.list_head(*c).into(),
        }
    }
}

fn list_node(id: CollectionId, ix: usize) -> oxrdf::BlankNode {
    oxrdf::BlankNode::new_unchecked(format!("c{}_{ix}", id.0))
}

impl Store for MemoryStore {
    fn sym(&mut self, uri: &str) -> Term {
        // legacy resolution does not always produce valid IRIs,
        // they are kept as-is
        NamedNode::new_unchecked(uri).into()
    }

    fn literal(&mut self, value: &str, lang: Option<&str>, datatype: Option<&Term>) -> Term {
        let literal = match (datatype.and_then(Term::as_named_node), lang) {
            (Some(datatype), _) => oxrdf::Literal::new_typed_literal(value, datatype.clone()),
            (None, Some(lang)) if !lang.is_empty() => {
                oxrdf::Literal::new_language_tagged_literal_unchecked(
                    value,
                    lang.to_ascii_lowercase(),
                )
            }
            (None, _) => oxrdf::Literal::new_simple_literal(value),
        };

        literal.into()
    }

    fn bnode(&mut self, _id: Option<&str>) -> Term {
        let label = format!("b{}", self.next_bnode);
        self.next_bnode += 1;
        oxrdf::BlankNode::new_unchecked(label).into()
    }

    fn collection(&mut self) -> CollectionId {
        self.collections.push(Collection::default());
        CollectionId(self.collections.len() - 1)
    }

    fn append(&mut self, collection: CollectionId, member: Term) {
        match self.collections.get_mut(collection.0) {
            Some(c) if !c.closed => c.members.push(member),
            Some(_) => warn!("Ignoring append to closed collection {collection}: {member}"),
            None => warn!("Ignoring append to unknown collection {collection}: {member}"),
        }
    }

    fn close(&mut self, collection: CollectionId) {
        if let Some(c) = self.collections.get_mut(collection.0) {
            c.closed = true;
        }
    }

    fn add(&mut self, subject: Term, predicate: Term, object: Term, why: &GraphName) {
        self.statements.push(Statement {
            subject,
            predicate,
            object,
            why: why.clone(),
        });
    }

    fn set_prefix_for_uri(&mut self, prefix: &str, uri: &str) -> Result<(), Error> {
        match self.namespaces.entry(prefix.to_string()) {
            Entry::Occupied(bound) => Err(Error::DuplicatePrefix {
                prefix: prefix.to_string(),
                bound: bound.get().clone(),
            }),
            Entry::Vacant(entry) => {
                debug!("Binding prefix {prefix}: <{uri}>");
                entry.insert(uri.to_string());
                Ok(())
            }
        }
    }
}
