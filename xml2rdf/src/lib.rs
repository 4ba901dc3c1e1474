//! An RDF/XML parser.
//!
//! The parser walks an already-built XML tree ([`roxmltree`]) and hands every statement it finds to
//! a [`Store`]. [`MemoryStore`] is a simple implementation that keeps statements in the order they
//! were emitted and can export them as an [`oxrdf::Graph`] or [`oxrdf::Dataset`].
//!
//! ```
//! use xml2rdf::MemoryStore;
//!
//! let doc = r##"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
//!                       xmlns:foaf="http://xmlns.com/foaf/0.1/">
//!   <foaf:Person rdf:about="#me">
//!     <foaf:name>Ann</foaf:name>
//!   </foaf:Person>
//! </rdf:RDF>"##;
//!
//! let mut store = MemoryStore::new();
//! xml2rdf::parse(doc, "http://example.org/people", &mut store)?;
//! assert_eq!(store.len(), 2);
//! # Ok::<_, xml2rdf::Error>(())
//! ```

mod attributes;
mod frame;
mod parser;
mod store;
pub mod uri;

pub use parser::RdfXmlParser;
pub use store::{Collection, CollectionId, MemoryStore, Statement, Store, Term};

/// The media type this parser understands.
pub const MEDIA_TYPE: &str = "application/rdf+xml";

/// Parses an RDF/XML document from text into `store`, using the default parser configuration
/// (no reification) and the default graph as context.
pub fn parse(input: &str, base: &str, store: &mut impl Store) -> Result<(), Error> {
    RdfXmlParser::new().parse_str(input, base, oxrdf::GraphName::DefaultGraph, store)
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub enum Error {
    #[display("RDF/XML parser: can't find a root element in <{base}>")]
    NoRootElement { base: String },

    #[display("RDF/XML syntax error: no namespace for `{name}` in <{base}>")]
    MissingNamespace { name: String, base: String },

    #[display(
        "RDF/XML parser: {element} has both rdf:ID and rdf:about; only one of these may be specified on a node"
    )]
    AmbiguousNodeId { element: String },

    #[display("invalid base URI <{base}>: no scheme delimiter")]
    InvalidBase { base: String },

    #[display("can't redefine prefix `{prefix}` (already bound to <{bound}>)")]
    DuplicatePrefix { prefix: String, bound: String },

    #[display("XML parse error: {_0}")]
    Xml(roxmltree::Error),
}

pub(crate) mod rdf_syntax {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#RDF";
    pub const DESCRIPTION: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Description";
    pub const LI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#li";

    // attribute local names, looked up in the RDF namespace
    pub const ABOUT: &str = "about";
    pub const ID: &str = "ID";
    pub const NODE_ID: &str = "nodeID";
    pub const RESOURCE: &str = "resource";
    pub const TYPE: &str = "type";
    pub const DATATYPE: &str = "datatype";
    pub const PARSE_TYPE: &str = "parseType";
}

pub(crate) mod xml_ns {
    pub const NS: &str = "http://www.w3.org/XML/1998/namespace";
}
