//! Server bring-up: TCP accept loop, minimal NetBIOS session-service
//! framing (needed for a runnable binary but otherwise out of scope),
//! and the per-connection dispatch loop.

pub mod config;
pub mod connection;
pub mod server;
pub mod session;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::dispatch::{build_registry, dispatch};
use crate::message::Message;
use crate::server::connection::Connection;
use crate::server::server::Server;

pub use config::ServerConfig;
pub use server::{Server as SMBServer, ServerBuilder};

/// NetBIOS session-service message framing: 1-byte type + 3-byte
/// big-endian length, payload follows. Real NBSS has more message types
/// and a session-request handshake; this is the minimal subset needed
/// to hand the dispatcher whole SMB buffers.
async fn read_nbss_payload(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut nbss_header = [0u8; 4];
    match stream.read_exact(&mut nbss_header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let length = ((nbss_header[1] as usize) << 16) | ((nbss_header[2] as usize) << 8) | nbss_header[3] as usize;
    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

fn write_nbss_payload(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    let len = payload.len();
    out.push(0x00); // session message
    out.push(((len >> 16) & 0xFF) as u8);
    out.push(((len >> 8) & 0xFF) as u8);
    out.push((len & 0xFF) as u8);
    out.extend_from_slice(payload);
    out
}

pub async fn run(server: Server) -> anyhow::Result<()> {
    let addr = format!("{}:{}", server.config.bind_address, server.config.port);
    let listener = TcpListener::bind(&addr).await?;
    #[cfg(feature = "tracing")]
    tracing::info!(%addr, "SMB server listening");

    let server = std::sync::Arc::new(server);
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            #[cfg(feature = "tracing")]
            tracing::debug!(%peer, "connection accepted");
            #[cfg(not(feature = "tracing"))]
            let _ = peer;
            if let Err(_err) = handle_connection(stream, &server).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "connection terminated");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, server: &Server) -> anyhow::Result<()> {
    let registry = build_registry();
    let mut connection = Connection::new();

    loop {
        let payload = match read_nbss_payload(&mut stream).await {
            Ok(Some(p)) => p,
            Ok(None) => break,
            Err(err) => return Err(err.into()),
        };

        let mut message = match Message::decode(&payload) {
            Ok(m) => m,
            Err(_err) => {
                // Malformed header/command structure: drop before it ever reaches dispatch.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "rejecting malformed SMB message");
                continue;
            }
        };

        dispatch(&mut message, &registry, &mut connection, server).await;

        if message.processed {
            continue;
        }
        let encoded = message.encode();
        stream.write_all(&write_nbss_payload(&encoded)).await?;
    }

    connection.teardown().await;
    Ok(())
}
