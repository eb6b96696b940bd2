pub mod newshub;

pub use newshub::{ChannelSink, LogSink, NewsHubHandler, NewsItem, NewsSink, NEWS_HUB, SEND_UPDATES};
