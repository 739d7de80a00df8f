use anyhow::{Context, Result};
use clap::Parser;
use graphrag::medical::build_prompt;
use graphrag::{Config, MedicalRag};

#[derive(Parser, Debug)]
#[command(name = "medical_rag")]
#[command(about = "Build a DBpedia medical knowledge graph and ask an LLM about it")]
struct Args {
    /// Search term to look up (repeatable); defaults to medical.search_terms
    #[arg(short, long = "term")]
    terms: Vec<String>,

    /// Question to answer; defaults to medical.demo_query
    #[arg(short, long)]
    query: Option<String>,

    /// Print the retrieved context and prompt instead of calling the LLM
    #[arg(long)]
    context_only: bool,

    /// Print the knowledge graph as JSON after building it
    #[arg(long)]
    dump_graph: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.graphrag.log_level),
    )
    .init();

    // The key is only needed when the LLM is actually called
    let api_key = match config.llm.api_key() {
        Ok(key) => key,
        Err(_) if args.context_only => "unused".to_string(),
        Err(e) => return Err(e),
    };
    let mut rag = MedicalRag::from_config(&config, api_key)?;

    let terms = if args.terms.is_empty() {
        config.medical.search_terms.clone()
    } else {
        args.terms
    };
    let query = args.query.unwrap_or_else(|| config.medical.demo_query.clone());

    log::info!("Building knowledge graph from {} search term(s)", terms.len());
    let found = rag
        .build_graph(&terms)
        .await
        .context("Failed to query the SPARQL endpoint")?;
    let stats = rag.graph().stats();
    log::info!(
        "{} of {} terms matched: {} nodes, {} edges",
        found,
        terms.len(),
        stats.node_count,
        stats.edge_count
    );

    if args.dump_graph {
        println!("{}", serde_json::to_string_pretty(&rag.graph().snapshot())?);
    }

    println!("{}", query);
    println!("{}", "-".repeat(40));

    if args.context_only {
        let context = rag.generate_rag_context(&query);
        println!("{}", build_prompt(&context, &query));
        return Ok(());
    }

    let response = rag
        .query_with_rag(&query)
        .await
        .context("Chat completion failed")?;
    println!("{}", response);

    Ok(())
}
