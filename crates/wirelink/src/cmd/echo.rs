use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use wirelink_conn::{Connection, ConnectionConfig, ConnectionError, EventSink};
use wirelink_frame::Message;
use wirelink_transport::TcpEndpoint;

use crate::cmd::EchoArgs;
use crate::exit::{connection_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

/// Sends every received message straight back on the same connection.
struct EchoSink {
    type_ids: Option<Vec<u16>>,
}

impl EchoSink {
    fn accepts(&self, type_id: u16) -> bool {
        self.type_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&type_id))
    }
}

impl EventSink for EchoSink {
    fn on_message_received(&self, conn: &Connection, message: wirelink_conn::Result<Bytes>) {
        let message = match message.and_then(|m| Message::parse(m).map_err(ConnectionError::from))
        {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "receive failed; closing connection");
                conn.dispose();
                return;
            }
        };
        if !self.accepts(message.type_id) {
            return;
        }

        info!(
            type_id = message.type_id,
            size = message.payload.len(),
            "echoing message"
        );
        if let Err(err) = conn.send_message(message.type_id, Some(message.payload.as_ref())) {
            warn!(error = %err, "echo send failed");
        }
    }

    fn on_send_completed(&self, conn: &Connection, result: wirelink_conn::Result<usize>) {
        if let Err(err) = result {
            warn!(error = %err, "echo write failed; closing connection");
            conn.dispose();
        }
    }

    fn on_disconnected(&self, conn: &Connection, error: Option<ConnectionError>) {
        match error {
            Some(err) => warn!(error = %err, "connection ended with error"),
            None => info!("peer disconnected"),
        }
        conn.dispose();
    }
}

pub async fn run(args: EchoArgs) -> CliResult<i32> {
    let endpoint = TcpEndpoint::bind(args.addr.as_str())
        .await
        .map_err(|err| transport_error("bind failed", err))?;
    let sink: Arc<dyn EventSink> = Arc::new(EchoSink {
        type_ids: args.type_ids,
    });
    let config = ConnectionConfig::with_max_frame_size(args.max_frame_size);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut live: Vec<Connection> = Vec::new();

    loop {
        tokio::select! {
            accepted = endpoint.accept() => {
                let transport = accepted.map_err(|err| transport_error("accept failed", err))?;
                let conn = Connection::open(transport, Arc::clone(&sink), config.clone())
                    .map_err(|err| connection_error("open failed", err))?;
                info!(peer = ?conn.remote_endpoint().ok(), "accepted connection");
                live.retain(|c| !c.is_disposed());
                live.push(conn);
            }
            signal = &mut shutdown => {
                signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                })?;
                info!("interrupted; shutting down");
                break;
            }
        }
    }

    for conn in live {
        conn.dispose();
    }
    Ok(SUCCESS)
}
