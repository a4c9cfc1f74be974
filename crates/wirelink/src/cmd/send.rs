use std::collections::VecDeque;
use std::fs;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::debug;
use wirelink_conn::{ChannelSink, Connection, ConnectionConfig, ConnectionEvent};
use wirelink_frame::Message;
use wirelink_transport::TcpEndpoint;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{
    connection_error, frame_error, io_error, transport_error, CliError, CliResult, FAILURE,
    SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_message, OutputFormat};

type Events = UnboundedReceiver<(Connection, ConnectionEvent)>;

enum Payload {
    Raw(Vec<u8>),
    Json(serde_json::Value),
}

/// What a single event means for a command waiting on the connection.
#[derive(Debug)]
enum Step<T> {
    /// Not the event being waited for; kept for a later wait.
    Skip(ConnectionEvent),
    Done(T),
    Failed(CliError),
}

/// Connection events, with the ones an earlier wait skipped replayed first.
///
/// A response can be delivered before the send completion for the request
/// that caused it, so nothing may be dropped while waiting.
struct EventQueue {
    events: Events,
    backlog: VecDeque<ConnectionEvent>,
}

impl EventQueue {
    fn new(events: Events) -> Self {
        Self {
            events,
            backlog: VecDeque::new(),
        }
    }

    async fn wait_for<T>(
        &mut self,
        limit: Duration,
        what: &str,
        step: fn(ConnectionEvent) -> Step<T>,
    ) -> CliResult<T> {
        let mut skipped = VecDeque::new();
        let mut outcome = None;
        while let Some(event) = self.backlog.pop_front() {
            match step(event) {
                Step::Skip(event) => skipped.push_back(event),
                Step::Done(value) => {
                    outcome = Some(Ok(value));
                    break;
                }
                Step::Failed(err) => {
                    outcome = Some(Err(err));
                    break;
                }
            }
        }
        skipped.append(&mut self.backlog);
        self.backlog = skipped;
        if let Some(outcome) = outcome {
            return outcome;
        }

        let events = &mut self.events;
        let backlog = &mut self.backlog;
        let pending = async {
            while let Some((_, event)) = events.recv().await {
                match step(event) {
                    Step::Skip(event) => backlog.push_back(event),
                    Step::Done(value) => return Ok(value),
                    Step::Failed(err) => return Err(err),
                }
            }
            Err(CliError::new(FAILURE, format!("{what}: connection closed")))
        };
        timeout(limit, pending).await.map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("timed out after {}ms waiting for {what}", limit.as_millis()),
            )
        })?
    }
}

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let transport = TcpEndpoint::connect(args.addr.as_str())
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let (sink, events) = ChannelSink::new();
    let conn = Connection::open(transport, sink, ConnectionConfig::default())
        .map_err(|err| connection_error("connect failed", err))?;

    let mut events = EventQueue::new(events);
    let result = exchange(&conn, &mut events, &args, payload, wait_timeout, format).await;
    conn.dispose();
    result
}

async fn exchange(
    conn: &Connection,
    events: &mut EventQueue,
    args: &SendArgs,
    payload: Payload,
    wait_timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let queued = match &payload {
        Payload::Raw(bytes) => conn.send_message(args.type_id, Some(bytes.as_slice())),
        Payload::Json(value) => conn.send_object(args.type_id, value),
    };
    queued.map_err(|err| connection_error("send failed", err))?;

    let written = events.wait_for(wait_timeout, "send", send_step).await?;
    debug!(bytes = written, "message sent");

    if args.wait {
        let message = events.wait_for(wait_timeout, "response", response_step).await?;
        let peer = conn
            .remote_endpoint()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        print_message(&message, &peer, format);
    }

    if conn.disconnect().is_ok() {
        // The peer may already have gone away; closing is best-effort from here.
        let closed = events.wait_for(wait_timeout, "disconnect", disconnect_step).await;
        if let Err(err) = closed {
            debug!(error = %err, "graceful disconnect did not complete");
        }
    }
    Ok(SUCCESS)
}

fn send_step(event: ConnectionEvent) -> Step<usize> {
    match event {
        ConnectionEvent::SendCompleted(Ok(written)) => Step::Done(written),
        ConnectionEvent::SendCompleted(Err(err)) => {
            Step::Failed(connection_error("send failed", err))
        }
        ConnectionEvent::Disconnected(_) => Step::Failed(CliError::new(
            FAILURE,
            "send failed: peer disconnected before the message was written",
        )),
        other => Step::Skip(other),
    }
}

fn response_step(event: ConnectionEvent) -> Step<Message> {
    match event {
        ConnectionEvent::MessageReceived(Ok(delivered)) => match Message::parse(delivered) {
            Ok(message) => Step::Done(message),
            Err(err) => Step::Failed(frame_error("receive failed", err)),
        },
        ConnectionEvent::MessageReceived(Err(err)) => {
            Step::Failed(connection_error("receive failed", err))
        }
        ConnectionEvent::Disconnected(_) => Step::Failed(CliError::new(
            FAILURE,
            "receive failed: peer disconnected before responding",
        )),
        other => Step::Skip(other),
    }
}

fn disconnect_step(event: ConnectionEvent) -> Step<()> {
    match event {
        ConnectionEvent::Disconnected(None) => Step::Done(()),
        ConnectionEvent::Disconnected(Some(err)) => {
            Step::Failed(connection_error("disconnect failed", err))
        }
        other => Step::Skip(other),
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Payload> {
    if let Some(json) = &args.json {
        let value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Payload::Json(value));
    }
    if let Some(data) = &args.data {
        return Ok(Payload::Raw(data.as_bytes().to_vec()));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map(Payload::Raw)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Payload::Raw(Vec::new()))
}
