#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use ssh_recover::mcp::{McpSSHCommands, SessionRegistry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let mcp_port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    // One registry for every MCP connection
    let registry = Arc::new(SessionRegistry::new());

    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpSSHCommands::new(registry.clone()))
            }),
        )
        .with(Tracing);

    info!("MCP Server with SSH session recovery is ready");
    info!("Use ssh_connect, then ssh_execute, ssh_shell_open or ssh_execute_with_recovery");

    Server::new(TcpListener::bind(mcp_addr))
        .name("SSH Recover MCP Server")
        .run(app)
        .await?;

    Ok(())
}
