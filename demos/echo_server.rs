//! Minimal echo server on top of `wirelink::conn`.
//!
//! ```sh
//! cargo run -p wirelink --example echo-server -- 127.0.0.1:9000
//! ```

use wirelink::conn::{ChannelSink, Connection, ConnectionConfig, ConnectionEvent};
use wirelink::frame::Message;
use wirelink::transport::TcpEndpoint;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9000".to_string());
    let endpoint = TcpEndpoint::bind(addr.as_str()).await?;
    println!("echo server listening on {}", endpoint.local_addr()?);

    let (sink, mut events) = ChannelSink::new();
    loop {
        tokio::select! {
            accepted = endpoint.accept() => {
                let conn = Connection::open(accepted?, sink.clone(), ConnectionConfig::default())?;
                println!("client connected: {:?}", conn.remote_endpoint().ok());
            }
            Some((conn, event)) = events.recv() => match event {
                ConnectionEvent::MessageReceived(Ok(delivered)) => {
                    let message = Message::parse(delivered)?;
                    conn.send_message(message.type_id, Some(message.payload.as_ref()))?;
                }
                ConnectionEvent::MessageReceived(Err(err)) => {
                    eprintln!("receive failed: {err}");
                    conn.dispose();
                }
                ConnectionEvent::Disconnected(_) => {
                    println!("client disconnected");
                    conn.dispose();
                }
                _ => {}
            },
        }
    }
}
