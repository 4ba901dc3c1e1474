use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use xml2rdf::{MemoryStore, RdfXmlParser};

/// Media types accepted from a server, besides the RDF/XML one.
const XML_MEDIA_TYPES: &[&str] = &[xml2rdf::MEDIA_TYPE, "application/xml", "text/xml"];

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Document to convert (`http:`, `https:` or `file:`)
    #[arg(value_name = "URL")]
    target: url::Url,

    /// Base URI for relative references, instead of the document URL
    #[arg(long)]
    base: Option<String>,

    /// Also describe statements made by properties with an `rdf:ID`
    #[arg(long)]
    reify: bool,

    /// Name of the graph the statements go in; output is TriG instead of Turtle
    #[arg(long, value_name = "IRI")]
    graph: Option<String>,

    /// Log to stderr, filtered by RUST_LOG if set
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(args: &Args) {
    let filter = if args.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into())
    } else {
        tracing_subscriber::EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args);

    let base = args.base.clone().unwrap_or_else(|| args.target.to_string());
    let base_iri = oxiri::Iri::parse(base.clone())?;

    let Some(content) = fetch(&args.target)? else {
        return Ok(ExitCode::FAILURE);
    };

    let why = match &args.graph {
        Some(graph) => oxrdf::NamedNode::new(graph.clone())?.into(),
        None => oxrdf::GraphName::DefaultGraph,
    };

    let mut store = MemoryStore::new();
    RdfXmlParser::new()
        .with_reification(args.reify)
        .parse_str(&content, base_iri.as_str(), why, &mut store)?;

    debug!("Read {} statements from <{base}>", store.len());

    let mut locked_out = std::io::stdout().lock();
    if args.graph.is_some() {
        let serializer = store.namespaces().iter().try_fold(
            oxttl::TriGSerializer::new(),
            |serializer, (prefix, value)| serializer.with_prefix(prefix, value),
        )?;

        let mut writer = serializer.for_writer(&mut locked_out);
        for quad in store.to_dataset().iter() {
            writer.serialize_quad(quad)?;
        }
        writer.finish()?;
    } else {
        let serializer = store.namespaces().iter().try_fold(
            oxttl::TurtleSerializer::new(),
            |serializer, (prefix, value)| serializer.with_prefix(prefix, value),
        )?;

        let mut writer = serializer.for_writer(&mut locked_out);
        for triple in store.to_graph().iter() {
            writer.serialize_triple(triple)?;
        }
        writer.finish()?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Reads the document, or returns `None` (after saying why) when it isn't XML.
fn fetch(target: &url::Url) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if target.scheme() == "file" {
        let path = target
            .to_file_path()
            .map_err(|()| format!("not a local file path: {target}"))?;
        debug!("Reading {}", path.display());
        return Ok(Some(std::fs::read_to_string(path)?));
    }

    debug!("Fetching {target}");
    let client = reqwest::blocking::Client::new();
    let response = client
        .get(target.clone())
        .header(reqwest::header::ACCEPT, xml2rdf::MEDIA_TYPE)
        .send()?
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    if content_type.is_some_and(|ct| !XML_MEDIA_TYPES.iter().any(|mt| ct.starts_with(mt))) {
        eprintln!("Error: content type is not an XML media type.");
        return Ok(None);
    }

    Ok(Some(response.text()?))
}
