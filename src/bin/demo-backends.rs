//! Throwaway backends for exercising the balancer by hand.
//!
//! ```text
//! demo-backends latency   # 8081 fast, 8083 slow, 8082 really slow
//! demo-backends chaos     # 8081 stable, 8082 chaos, 8083 zombie
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use clap::{Parser, Subcommand};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use failover_lb::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "demo-backends")]
#[command(about = "Demo upstream servers for manual load balancer testing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Three backends answering after 1s, 2s and 5s
    Latency,
    /// A stable, a randomly failing and a periodically dying backend
    Chaos,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Latency => {
            tokio::try_join!(
                serve_delayed(8081, Duration::from_secs(1), "Server 1 (Fast)"),
                serve_delayed(8083, Duration::from_secs(2), "Server 2 (Slow)"),
                serve_delayed(8082, Duration::from_secs(5), "Server 3 (Really Slow)"),
            )?;
        }
        Commands::Chaos => {
            tokio::try_join!(serve_stable(8081), serve_chaos(8082), serve_zombie(8083))?;
        }
    }
    Ok(())
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn serve_delayed(port: u16, delay: Duration, name: &'static str) -> std::io::Result<()> {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        tracing::info!(backend = name, "Request received");
        format!("Hello from {}", name)
    });

    let listener = TcpListener::bind(addr(port)).await?;
    tracing::info!(backend = name, port, ?delay, "Backend started");
    axum::serve(listener, app).await
}

async fn serve_stable(port: u16) -> std::io::Result<()> {
    let app = Router::new().fallback(move || async move { format!("STABLE Server ({})", port) });

    let listener = TcpListener::bind(addr(port)).await?;
    tracing::info!(port, "Stable server running");
    axum::serve(listener, app).await
}

/// 25% of requests are read and then dropped without a response, 25% lag
/// for two seconds, the rest succeed.
async fn serve_chaos(port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr(port)).await?;
    tracing::info!(port, "Chaos server running");

    loop {
        let (socket, _) = listener.accept().await?;
        let risk = rand::thread_rng().gen_range(0..100);
        tokio::spawn(handle_chaos(socket, port, risk));
    }
}

async fn handle_chaos(mut socket: TcpStream, port: u16, risk: u32) {
    // Health probes connect and close without sending anything.
    match read_head(&mut socket).await {
        Ok(head) if !head.is_empty() => {}
        _ => return,
    }

    if risk < 25 {
        tracing::warn!(port, "CHAOS: killing connection");
        drop(socket);
        return;
    }
    if risk < 50 {
        tracing::warn!(port, "CHAOS: lagging (2s)");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let body = format!("CHAOS Server ({})", port);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read up to the blank line ending the request head.
async fn read_head(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < 64 * 1024 {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    Ok(head)
}

/// Serves for 8 to 11 seconds, disappears for 5, forever.
async fn serve_zombie(port: u16) -> std::io::Result<()> {
    loop {
        let app = Router::new().fallback(move || async move { format!("ZOMBIE Server ({})", port) });
        let listener = TcpListener::bind(addr(port)).await?;
        tracing::info!(port, "Zombie is ALIVE");

        let lifetime = Duration::from_secs(rand::thread_rng().gen_range(8..12));
        axum::serve(listener, app)
            .with_graceful_shutdown(tokio::time::sleep(lifetime))
            .await?;

        tracing::warn!(port, "Zombie DIED (rebooting in 5s)");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}
