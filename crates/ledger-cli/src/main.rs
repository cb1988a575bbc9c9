use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        /// Author of the record
        #[arg(long)]
        author: String,
        /// Record content
        #[arg(long)]
        content: String,
    },
    /// Mine the node's pending transactions
    Mine,
    /// Print the node's chain and peers
    Chain,
    /// Print the node's pending transactions
    Pending,
    /// Make the node join the network through another node
    Join {
        /// Base URL of a node already in the network
        #[arg(long)]
        peer: String,
    },
}

#[derive(Serialize)]
struct Tx {
    author: String,
    content: String,
}

#[derive(Serialize)]
struct NodeAddress {
    node_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    debug!(%node, command = ?cli.cmd, "sending request");

    let res = match cli.cmd {
        Command::Submit { author, content } => {
            client
                .post(format!("{node}/new_transaction"))
                .json(&Tx { author, content })
                .send()
                .await?
        }
        Command::Mine => client.get(format!("{node}/mine")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
        Command::Pending => client.get(format!("{node}/pending_tx")).send().await?,
        Command::Join { peer } => {
            client
                .post(format!("{node}/register_with"))
                .json(&NodeAddress { node_address: peer })
                .send()
                .await?
        }
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
