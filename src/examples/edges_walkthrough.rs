//! Walkthrough of documents and edges against a running server
//!
//! Run with: cargo run --example edges_walkthrough
//! Point it elsewhere with ARANGO_CONFIG=path/to/config.json

use anyhow::Result;
use arango_rs::{ConnectionConfig, CursorRequest, Direction, Document};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn handle(doc: &Document) -> String {
    doc.id().map(ToString::to_string).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arango_rs=debug,arango_core=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match std::env::var("ARANGO_CONFIG") {
        Ok(path) => ConnectionConfig::load(&path)?,
        Err(_) => ConnectionConfig::default(),
    };

    println!("=== Edges Walkthrough ===\n");
    println!("Connecting to {}", config.url());
    let conn = arango_rs::create(&config)?;

    let name = format!("walkthrough_{}", uuid::Uuid::new_v4().simple());
    let test = conn.collection(&name)?;
    test.create().await?;
    let links = conn.collection(&format!("{}_links", name))?;
    links.create_edges().await?;
    println!("Created collections {} and {}\n", test.name(), links.name());

    // Documents
    let docs = test.documents();
    let from_doc = docs.create(body(json!({"sample_key": "sample_value"}))).await?;
    let to_doc = docs.create(body(json!({"sample_key1": "sample_value1"}))).await?;
    println!("from_doc: {}", handle(&from_doc));
    println!("to_doc:   {}\n", handle(&to_doc));

    // Edges
    let edges = links.edges();
    let edge = edges
        .create(&from_doc, &to_doc, body(json!({"custom": 1})))
        .await?;
    println!("Edge created with custom = {}", edge.get("custom")?);

    let out = edges.of(&from_doc, Direction::Out)?.first().await?;
    if let Some(target) = out.to_document() {
        let target = target.resolve().await?;
        println!("Outgoing edge points at {:?}", target.body());
    }

    let incoming = edges.of_named(&to_doc, "in")?.collect().await?;
    println!("Incoming edges of to_doc: {}", incoming.len());

    match edges.of_named(&to_doc, "sideways") {
        Err(e) => println!("Rejected lookup: {}", e),
        Ok(_) => println!("Unexpectedly accepted an invalid direction"),
    }
    println!("Edges in collection: {}\n", edges.count().await?);

    // Traversal
    let walk = edges.traverse(&from_doc, Direction::Out, 3).await?;
    let stats = walk.graph().statistics();
    println!(
        "Traversal reached {} vertices over {} edges (cycles: {})",
        walk.vertices.len(),
        stats.edge_count,
        stats.has_cycles
    );

    // Cursor
    let rows = conn
        .query(CursorRequest::new(format!("FOR d IN {} RETURN d", name)).batch_size(1))
        .collect()
        .await?;
    println!("Cursor returned {} rows\n", rows.len());

    links.delete().await?;
    test.delete().await?;
    println!("Dropped collections");

    Ok(())
}
