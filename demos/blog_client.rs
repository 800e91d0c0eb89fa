//! Command line client for a running blogd node.
//!
//! ```bash
//! cargo run --example blog_client -- create --author-id a --title t --content c
//! cargo run --example blog_client -- list
//! cargo run --example blog_client -- watch
//! ```

use anyhow::Result;
use blogd::proto::blog_service_client::BlogServiceClient;
use blogd::proto::Blog;
use blogd::proto::CreateBlogRequest;
use blogd::proto::DeleteBlogRequest;
use blogd::proto::ListBlogRequest;
use blogd::proto::ReadBlogRequest;
use blogd::proto::UpdateBlogRequest;
use clap::Parser;
use clap::Subcommand;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tonic::transport::Channel;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:50051")]
    endpoint: String,
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    push_url: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Rpc(RpcCommand),
    /// Print every record pushed over the websocket until interrupted
    Watch,
}

#[derive(Subcommand)]
enum RpcCommand {
    Create {
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Read {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Delete {
        id: String,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch => watch(&cli.push_url).await,
        Commands::Rpc(command) => call(&cli.endpoint, command).await,
    }
}

async fn call(
    endpoint: &str,
    command: RpcCommand,
) -> Result<()> {
    let mut client = BlogServiceClient::connect(endpoint.to_string())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {:?}", endpoint, e))?;

    match command {
        RpcCommand::Create {
            author_id,
            title,
            content,
        } => {
            let blog = Blog {
                id: String::new(),
                author_id,
                title,
                content,
            };
            let response = client.create_blog(CreateBlogRequest { blog: Some(blog) }).await?;
            println!("blog created: {:?}", response.into_inner().blog);
        }
        RpcCommand::Read { id } => {
            let response = client.read_blog(ReadBlogRequest { blog_id: id }).await?;
            println!("blog found: {:?}", response.into_inner().blog);
        }
        RpcCommand::Update {
            id,
            author_id,
            title,
            content,
        } => {
            let blog = Blog {
                id,
                author_id,
                title,
                content,
            };
            let response = client.update_blog(UpdateBlogRequest { blog: Some(blog) }).await?;
            println!("blog updated: {:?}", response.into_inner().blog);
        }
        RpcCommand::Delete { id } => {
            let response = client.delete_blog(DeleteBlogRequest { blog_id: id }).await?;
            println!("blog deleted: {}", response.into_inner().blog_id);
        }
        RpcCommand::List => list(&mut client).await?,
    }
    Ok(())
}

async fn list(client: &mut BlogServiceClient<Channel>) -> Result<()> {
    let mut stream = client.list_blog(ListBlogRequest {}).await?.into_inner();
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => println!("blog received: {:?}", response.blog),
            Err(status) => {
                println!("{:?}: {}", status.code(), status.message());
                break;
            }
        }
    }
    Ok(())
}

async fn watch(push_url: &str) -> Result<()> {
    let (mut socket, _) = connect_async(push_url).await?;
    println!("watching {}", push_url);
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => println!("received: {}", text),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
