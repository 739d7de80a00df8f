use anyhow::Result;
use graphrag::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr, info by default
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "verify" => run_verification(),
        other => {
            anyhow::bail!(
                "Unknown command: {}\nUsage: graphrag [verify]\nRun the demos with the medical_rag and web_rag binaries.",
                other
            )
        }
    }
}

/// Load the configuration and report which demo can run with the current environment
fn run_verification() -> Result<()> {
    log::info!("Starting graphrag v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");

    log::info!("SPARQL endpoint: {}", config.medical.sparql_endpoint);
    log::info!("Search terms: {}", config.medical.search_terms.join(", "));
    log::info!("LLM: {} at {}", config.llm.model, config.llm.base_url);
    log::info!(
        "Embeddings: {} ({} dims) at {}",
        config.embeddings.model,
        config.embeddings.dimensions,
        config.embeddings.base_url
    );
    log::info!("Pages: {}", config.web.urls.join(", "));

    let mut ready = true;
    for (demo, var, present) in [
        ("medical_rag", &config.llm.api_key_env, config.llm.api_key().is_ok()),
        ("web_rag", &config.embeddings.api_key_env, config.embeddings.api_key().is_ok()),
    ] {
        if present {
            log::info!("✓ {} set, {} can run", var, demo);
        } else {
            log::warn!("{} not set, {} will fail", var, demo);
            ready = false;
        }
    }

    if ready {
        log::info!("✓ Configuration verification complete");
    }

    Ok(())
}
