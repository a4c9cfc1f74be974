use tracing::{info, warn};
use wirelink_conn::{ChannelSink, Connection, ConnectionConfig, ConnectionEvent};
use wirelink_frame::Message;
use wirelink_transport::TcpEndpoint;

use crate::cmd::ListenArgs;
use crate::exit::{connection_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = TcpEndpoint::bind(args.addr.as_str())
        .await
        .map_err(|err| transport_error("bind failed", err))?;
    let config = ConnectionConfig::with_max_frame_size(args.max_frame_size);
    let (sink, mut events) = ChannelSink::new();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut live: Vec<Connection> = Vec::new();
    let mut printed = 0usize;

    loop {
        tokio::select! {
            accepted = endpoint.accept() => {
                let transport = accepted.map_err(|err| transport_error("accept failed", err))?;
                let conn = Connection::open(transport, sink.clone(), config.clone())
                    .map_err(|err| connection_error("open failed", err))?;
                info!(peer = ?conn.remote_endpoint().ok(), "accepted connection");
                live.retain(|c| !c.is_disposed());
                live.push(conn);
            }
            Some((conn, event)) = events.recv() => {
                let Some(message) = handle_event(&conn, event) else {
                    continue;
                };
                if !wanted(args.type_ids.as_deref(), message.type_id) {
                    continue;
                }

                let peer = conn
                    .remote_endpoint()
                    .map(|addr| addr.to_string())
                    .unwrap_or_default();
                print_message(&message, &peer, format);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
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

/// React to one connection event; returns the message to print, if any.
fn handle_event(conn: &Connection, event: ConnectionEvent) -> Option<Message> {
    match event {
        ConnectionEvent::MessageReceived(Ok(delivered)) => match Message::parse(delivered) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(error = %err, "dropping truncated message");
                None
            }
        },
        ConnectionEvent::MessageReceived(Err(err)) => {
            warn!(error = %err, "receive failed; closing connection");
            conn.dispose();
            None
        }
        ConnectionEvent::Disconnected(error) => {
            match error {
                Some(err) => warn!(error = %err, "connection ended with error"),
                None => info!("peer disconnected"),
            }
            conn.dispose();
            None
        }
        ConnectionEvent::SendCompleted(_) | ConnectionEvent::FragmentReceived => None,
    }
}

fn wanted(filter: Option<&[u16]>, type_id: u16) -> bool {
    filter.is_none_or(|ids| ids.contains(&type_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_listed_type_ids_only() {
        assert!(wanted(None, 42));
        assert!(wanted(Some(&[1, 42]), 42));
        assert!(!wanted(Some(&[1, 2]), 42));
        assert!(!wanted(Some(&[]), 0));
    }
}
