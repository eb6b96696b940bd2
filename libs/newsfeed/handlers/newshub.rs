//! NewsHub dispatcher
//!
//! Picks `newshub.sendUpdates` invocations out of decoded frames and turns
//! their first argument into [`NewsItem`]s for a [`NewsSink`].
//!
//! The argument arrives either as a JSON array or as a string holding one:
//!
//! ```text
//! {"H":"NewsHub","M":"sendUpdates","A":["[{\"Title\":\"...\",\"Description\":\"...\"}]"]}
//! ```

use chrono::{DateTime, Utc};
use hubsockets::codec::{DecodedMessage, HubInvocation};
use hubsockets::{DispatchError, Dispatcher};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

pub const NEWS_HUB: &str = "newshub";
pub const SEND_UPDATES: &str = "sendUpdates";

const PREVIEW_CHARS: usize = 500;

/// One headline pushed by the feed
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    /// Every field of the wire object, including `Title`/`Description`
    pub fields: Map<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl NewsItem {
    /// Build an item from one wire object
    ///
    /// Returns `None` for non-objects and for items whose title and
    /// description are both blank.
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let title = text_field(fields, "Title");
        let description = text_field(fields, "Description");
        if title.is_empty() && description.is_empty() {
            return None;
        }
        Some(Self {
            title,
            description,
            fields: fields.clone(),
            received_at: Utc::now(),
        })
    }

    /// Title and description separated by a blank line
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.description)
        }
    }

    /// Description cut to a log-friendly length
    pub fn description_preview(&self) -> String {
        let mut preview: String = self.description.chars().take(PREVIEW_CHARS).collect();
        if self.description.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        preview
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Destination for parsed news items
///
/// Called on the session's dispatch thread; an `Err` is logged by the
/// session and delivery continues with the next message.
pub trait NewsSink: Send + Sync + 'static {
    fn publish(&self, item: NewsItem) -> Result<(), DispatchError>;
}

/// Writes each item to the log
pub struct LogSink;

impl NewsSink for LogSink {
    fn publish(&self, item: NewsItem) -> Result<(), DispatchError> {
        if item.description.is_empty() {
            info!(title = %item.title, "News");
        } else {
            info!(
                title = %item.title,
                description = %item.description_preview(),
                "News"
            );
        }
        Ok(())
    }
}

/// Forwards items to a crossbeam channel for a downstream consumer
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<NewsItem>,
}

impl ChannelSink {
    pub fn new() -> (Self, crossbeam_channel::Receiver<NewsItem>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: crossbeam_channel::Sender<NewsItem>) -> Self {
        Self { tx }
    }
}

impl NewsSink for ChannelSink {
    fn publish(&self, item: NewsItem) -> Result<(), DispatchError> {
        self.tx
            .send(item)
            .map_err(|_| DispatchError::new("news receiver dropped"))
    }
}

/// Dispatcher for `newshub.sendUpdates`
pub struct NewsHubHandler<S: NewsSink> {
    sink: S,
    items: AtomicU64,
    skipped: AtomicU64,
}

impl<S: NewsSink> NewsHubHandler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            items: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Items handed to the sink so far
    pub fn items_published(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    /// `sendUpdates` payloads or items that could not be used
    pub fn items_skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    fn handle_invocation(&self, invocation: &HubInvocation) -> Result<(), DispatchError> {
        let Some(payload) = invocation.args.first() else {
            debug!("sendUpdates without arguments");
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        let items = match news_list(payload) {
            Some(items) => items,
            None => {
                warn!("Unusable sendUpdates payload: {}", short(payload));
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        let mut first_error = None;
        for value in &items {
            match NewsItem::from_value(value) {
                Some(item) => {
                    if let Err(e) = self.sink.publish(item) {
                        first_error.get_or_insert(e);
                    } else {
                        self.items.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: NewsSink> Dispatcher for NewsHubHandler<S> {
    fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError> {
        let mut result = Ok(());
        for invocation in &message.invocations {
            if !invocation.is_hub(NEWS_HUB) || invocation.method != SEND_UPDATES {
                continue;
            }
            if let Err(e) = self.handle_invocation(invocation) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

/// Array payload, possibly wrapped in a JSON string
fn news_list(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw).ok()? {
            Value::Array(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn short(value: &Value) -> String {
    let s = value.to_string();
    match s.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s,
    }
}
