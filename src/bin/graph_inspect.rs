use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use fb_carousel::config;
use fb_carousel::graph::{GraphClient, GraphService};

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Graph object id to inspect (page, post, video, creative...)
    #[arg(long)]
    id: String,

    /// Comma-separated fields to request
    #[arg(long, default_value = "id")]
    fields: String,

    /// Access token used for the lookup
    #[arg(long, env = "FB_ACCESS_TOKEN")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let client = GraphClient::from_config(&cfg)?;

    let object = client.get_object(&args.id, &args.fields, &args.token).await?;
    println!("Object ID: {}", args.id);
    match object.as_object() {
        Some(fields) => {
            println!("Fields:");
            for (name, value) in fields {
                println!("  {} -> {}", name, value);
            }
        }
        None => println!("{}", object),
    }
    Ok(())
}
