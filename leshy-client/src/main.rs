use anyhow::Result;
use clap::{Parser, Subcommand};
use leshy_client::LeshyClient;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "leshy")]
struct Cli {
    #[arg(long, env = "LESHY_ADDR", default_value = "127.0.0.1:50051")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish one message to a queue.
    Publish {
        queue: String,
        /// Message body; defaults to a small JSON demo payload.
        #[arg(long)]
        data: Option<String>,
    },
    /// Subscribe to a queue and log everything it delivers.
    Listen {
        queue: String,
        #[arg(long, default_value = "")]
        consumer: String,
        /// Acknowledge each message as it arrives.
        #[arg(long)]
        ack: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let client = LeshyClient::connect(&cli.addr).await?;

    match cli.command {
        Command::Publish { queue, data } => {
            let body = match data {
                Some(data) => data.into_bytes(),
                None => serde_json::to_vec(&serde_json::json!({"a": 1, "b": "asd"}))?,
            };

            let mut client = client;
            let ack = client.publish(&queue, &body).await?;
            info!(id = %ack.id, %queue, "published message");
        }

        Command::Listen { queue, consumer, ack } => {
            let mut sub = client.subscribe(&queue, &consumer).await?;
            info!(%queue, %consumer, "listening");

            while let Some(delivery) = sub.next().await? {
                info!(
                    id = %delivery.id,
                    data = %String::from_utf8_lossy(&delivery.data),
                    "received message"
                );
                if ack {
                    sub.ack(&delivery.id).await?;
                }
            }
            info!("stream closed by server");
        }
    }

    Ok(())
}
