use itertools::Itertools;
use oxrdf::Graph;
use xml2rdf::MemoryStore;

pub const BASE: &str = "http://example.org/";

const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("ex", "http://example.org/stuff/1.0/"),
];

pub fn serialize_graph(graph: Graph, base: &str) -> String {
    // blank node labels depend on the store, so canonicalize first
    let idents = rdf_canon::issue_graph_with::<sha2::Sha256>(&graph, &Default::default()).unwrap();
    let graph = rdf_canon::relabel_graph(&graph, &idents).unwrap();

    let mut output = Vec::new();
    let mut ttl = oxttl::TurtleSerializer::new().with_base_iri(base).unwrap();

    for &(prefix, iri) in PREFIXES {
        ttl = ttl.with_prefix(prefix, iri).unwrap();
    }

    let mut ttl = ttl.for_writer(&mut output);
    for triple in graph.iter().sorted_by_cached_key(|t| {
        (
            t.subject.to_string(),
            if t.predicate.as_str() == "http://www.w3.org/1999/02/22-rdf-syntax-ns#type" {
                // make "a" come first
                None
            } else {
                Some(t.predicate.to_string())
            },
            t.object.to_string(),
        )
    }) {
        ttl.serialize_triple(triple).unwrap();
    }

    ttl.finish().unwrap();

    String::from_utf8_lossy(&output).into_owned()
}

#[allow(unused)]
pub fn parse(xml: &str) -> MemoryStore {
    let mut store = MemoryStore::new();
    xml2rdf::parse(xml, BASE, &mut store).unwrap();
    store
}

#[allow(unused)]
pub fn assert_graph(xml: &str, ttl: &str) {
    assert_graph_with(&xml2rdf::RdfXmlParser::new(), xml, ttl);
}

#[allow(unused)]
pub fn assert_graph_with(parser: &xml2rdf::RdfXmlParser, xml: &str, ttl: &str) {
    let mut store = MemoryStore::new();
    parser
        .parse_str(xml, BASE, oxrdf::GraphName::DefaultGraph, &mut store)
        .unwrap();

    let mut ttl_graph = Graph::new();
    {
        let ttl_rdf = oxttl::TurtleParser::new()
            .with_base_iri(BASE)
            .unwrap()
            .for_slice(ttl.as_bytes());
        for triple in ttl_rdf {
            ttl_graph.insert(&triple.unwrap());
        }
    }

    let output = serialize_graph(store.to_graph(), BASE);
    let ttl_output = serialize_graph(ttl_graph, BASE);

    pretty_assertions::assert_eq!(output, ttl_output);
}
