//! Line-delimited JSON replication.
//!
//! A [`ChangeStream`] is a transport-agnostic endpoint: bytes read from the
//! peer go into [`ChangeStream::write`], and lines for the peer come out of
//! [`ChangeStream::read_line`]. Each line is one [`Message`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use json_context_value::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::change::{PushOptions, SourceId};
use crate::context::{JsonContext, ListenerId};
use crate::error::StreamError;

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A change to apply.
    Change {
        object: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<i64>,
    },
    /// Request for every change newer than the timestamp.
    Since { since: i64 },
    /// Snapshot request. Only `"all"` is understood.
    Get { get: String },
    /// Snapshot response: `{data, matchers}`.
    Context { context: serde_json::Value },
}

impl Message {
    pub fn parse(line: &str) -> Result<Self, StreamError> {
        serde_json::from_str(line).map_err(|source| StreamError::Decode {
            line: line.to_string(),
            source,
        })
    }

    /// Serializes to a single newline-terminated line.
    pub fn encode(&self) -> Result<String, StreamError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Longest partial line kept while waiting for its newline.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Apply inbound changes without a permission check.
    pub verified_change: bool,
    /// A partial line growing past this is dropped up to its newline.
    pub max_line_bytes: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            verified_change: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl StreamOptions {
    pub fn verified() -> Self {
        Self {
            verified_change: true,
            ..Self::default()
        }
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }
}

pub struct ChangeStream {
    id: SourceId,
    listener: ListenerId,
    options: StreamOptions,
    outbound: Rc<RefCell<VecDeque<String>>>,
    inbound: Vec<u8>,
    /// Dropping the rest of an oversized line.
    discarding: bool,
    time: Option<i64>,
    snapshot: Option<serde_json::Value>,
    closed: bool,
}

impl JsonContext {
    /// Opens a replication endpoint. Every accepted change not originating
    /// from the stream itself is queued for the peer.
    pub fn change_stream(&mut self, options: StreamOptions) -> ChangeStream {
        let id = self.next_source_id();
        let outbound = Rc::new(RefCell::new(VecDeque::new()));
        let queue = Rc::clone(&outbound);

        let listener = self.on_change(move |change| {
            if change.source == Some(id) {
                return;
            }
            let Some(entity) = &change.entity else {
                return;
            };
            let message = Message::Change {
                object: entity.to_json_sanitized(),
                time: Some(change.time),
            };
            match message.encode() {
                Ok(line) => queue.borrow_mut().push_back(line),
                Err(err) => warn!(%err, "dropping change that does not encode"),
            }
        });

        debug!(stream = id.get(), "opened change stream");
        ChangeStream {
            id,
            listener,
            options,
            outbound,
            inbound: Vec::new(),
            discarding: false,
            time: None,
            snapshot: None,
            closed: false,
        }
    }
}

impl ChangeStream {
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Latest change timestamp received from the peer.
    pub fn time(&self) -> Option<i64> {
        self.time
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feeds bytes received from the peer. Complete lines are decoded and
    /// applied to `ctx`; a trailing partial line is kept for the next call.
    ///
    /// Returns the number of messages handled. Lines that do not decode are
    /// logged and skipped, as are lines longer than
    /// [`StreamOptions::max_line_bytes`].
    pub fn write(&mut self, ctx: &mut JsonContext, bytes: &[u8]) -> Result<usize, StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.inbound.extend_from_slice(bytes);

        let mut handled = 0;
        loop {
            let Some(end) = self.inbound.iter().position(|b| *b == b'\n') else {
                if self.discarding || self.inbound.len() > self.options.max_line_bytes {
                    if !self.discarding {
                        warn!(
                            stream = self.id.get(),
                            bytes = self.inbound.len(),
                            "dropping oversized line"
                        );
                    }
                    self.inbound.clear();
                    self.discarding = true;
                }
                break;
            };
            let raw: Vec<u8> = self.inbound.drain(..=end).collect();
            if std::mem::take(&mut self.discarding) {
                trace!(stream = self.id.get(), "skipped tail of oversized line");
                continue;
            }
            let Ok(line) = std::str::from_utf8(&raw) else {
                warn!(stream = self.id.get(), "skipping line that is not utf-8");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Message::parse(line) {
                Ok(message) => {
                    self.dispatch(ctx, message)?;
                    handled += 1;
                }
                Err(err) => warn!(stream = self.id.get(), %err, "skipping undecodable line"),
            }
        }
        Ok(handled)
    }

    fn dispatch(&mut self, ctx: &mut JsonContext, message: Message) -> Result<(), StreamError> {
        match message {
            Message::Change { object, .. } if !object.is_object() => {
                trace!(stream = self.id.get(), "ignoring change without an object");
            }
            Message::Change { object, time } => {
                let options = PushOptions {
                    verified_change: self.options.verified_change,
                    source: Some(self.id),
                    external: true,
                    time,
                    ..PushOptions::default()
                };
                ctx.push_change(Value::from(object), options);
                if let Some(time) = time {
                    self.time = Some(self.time.map_or(time, |t| t.max(time)));
                }
            }
            Message::Since { since } => {
                let lines = ctx
                    .changes_since(since)
                    .filter(|entry| entry.source != Some(self.id))
                    .map(|entry| {
                        Message::Change {
                            object: entry.object.to_json(),
                            time: Some(entry.time),
                        }
                        .encode()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                debug!(stream = self.id.get(), since, count = lines.len(), "backfilling");
                self.outbound.borrow_mut().extend(lines);
            }
            Message::Get { get } if get == "all" => {
                let context = ctx.to_json()?;
                self.send(&Message::Context { context })?;
            }
            Message::Get { get } => warn!(stream = self.id.get(), request = %get, "unsupported get request"),
            Message::Context { context } => self.snapshot = Some(context),
        }
        Ok(())
    }

    fn send(&self, message: &Message) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.outbound.borrow_mut().push_back(message.encode()?);
        Ok(())
    }

    /// Asks the peer for every change after `timestamp`.
    pub fn request_changes_since(&self, timestamp: i64) -> Result<(), StreamError> {
        self.send(&Message::Since { since: timestamp })
    }

    /// Asks the peer for its full state. The reply is available from
    /// [`ChangeStream::take_snapshot`] once written back into this stream.
    pub fn request_snapshot(&self) -> Result<(), StreamError> {
        self.send(&Message::Get { get: "all".into() })
    }

    /// Next line for the peer, newline included.
    pub fn read_line(&mut self) -> Option<String> {
        self.outbound.borrow_mut().pop_front()
    }

    /// Every pending line, concatenated.
    pub fn read_all(&mut self) -> String {
        self.outbound.borrow_mut().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbound.borrow().len()
    }

    pub fn take_snapshot(&mut self) -> Option<serde_json::Value> {
        self.snapshot.take()
    }

    /// Detaches from `ctx`. Further writes fail; queued lines stay readable.
    pub fn close(&mut self, ctx: &mut JsonContext) {
        if !self.closed {
            ctx.off_change(self.listener);
            self.closed = true;
            debug!(stream = self.id.get(), "closed change stream");
        }
    }
}

impl std::fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeStream")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .field("time", &self.time)
            .field("closed", &self.closed)
            .finish()
    }
}
