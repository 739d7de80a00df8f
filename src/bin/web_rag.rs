use anyhow::Result;
use clap::Parser;
use graphrag::embeddings::OpenAIEmbedder;
use graphrag::{Config, WebGraphRag};

#[derive(Parser, Debug)]
#[command(name = "web_rag")]
#[command(about = "Scrape pages into a similarity graph and rank them against a query")]
struct Args {
    /// Page to add (repeatable); defaults to web.urls
    #[arg(short, long = "url")]
    urls: Vec<String>,

    /// Query text; defaults to web.demo_query
    #[arg(short, long)]
    query: Option<String>,

    /// Number of results; defaults to web.default_top_k
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.graphrag.log_level),
    )
    .init();

    let embedder = OpenAIEmbedder::from_config(&config.embeddings, config.embeddings.api_key()?)?;
    let mut rag = WebGraphRag::from_config(&config.web, Box::new(embedder))?;

    let urls = if args.urls.is_empty() {
        config.web.urls.clone()
    } else {
        args.urls
    };
    let query = args.query.unwrap_or_else(|| config.web.demo_query.clone());
    let top_k = args.top_k.unwrap_or(config.web.default_top_k);

    rag.add_nodes(&urls).await?;
    rag.connect_all()?;
    log::info!(
        "Graph built: {} nodes, {} edges",
        rag.graph().node_count(),
        rag.graph().edge_count()
    );

    let results = rag.query(&query, top_k).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for result in &results {
        println!("\nURL: {}", result.url);
        println!("Content Preview: {}", result.content);
        println!("Similarity Score: {:.3}", result.similarity);
        println!("Connected to: {}", result.neighbors.join(", "));
    }

    Ok(())
}
