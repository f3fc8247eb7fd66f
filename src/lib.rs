//! Chainable element wrappers over a deterministic in-memory DOM.
//!
//! [`SimpleQuery`] selects and creates elements, handing out [`ElementWrapper`]s
//! whose mutators return the wrapper again so calls can be chained. Every
//! wrapper owns an [`EventRegistry`] that remembers the listeners attached
//! through it, so they can later be counted or removed by event name, by
//! handler identity, or all at once.
//!
//! ```
//! use simple_query::{Document, EventHandler, SimpleQuery};
//!
//! # fn main() -> simple_query::Result<()> {
//! let document = Document::from_html("<div id='box'><p>hi</p></div>")?;
//! let query = SimpleQuery::new(document.clone());
//! let mut boxed = query.select("#box")?.expect("box exists");
//!
//! let handler = EventHandler::new(|_, _| Ok(()));
//! boxed.add_class("active")?.on_click(&handler)?;
//! assert_eq!(boxed.event_count(Some("click"), None)?, 1);
//!
//! boxed.off_event(None, None)?;
//! assert_eq!(boxed.event_count(None, None)?, 0);
//! # Ok(())
//! # }
//! ```

use std::error::Error as StdError;
use std::fmt;

mod css;
mod document;
mod dom;
mod events;
mod html;
mod pattern;
mod query;
mod runtime_state;
mod selector;
mod wrapper;

pub use css::{CssRule, StyleSheetId};
pub use document::{Document, LayoutBox, Offset};
pub use dom::{NodeId, NodeKind};
pub use events::{
    EventHandler, EventRegistry, ListenerFilter, ListenerHost, ListenerRecord, SynthesizedEvent,
    native_event_name,
};
pub use query::SimpleQuery;
pub use runtime_state::{Event, EventInit, NativeListener, ReadyState};
pub use wrapper::{AsNode, Content, ElementWrapper};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidArgument { method: String, message: String },
    OutOfRange { method: String, index: usize, len: usize },
    HtmlParse(String),
    CssParse(String),
    UnsupportedSelector(String),
    Dom(String),
    Pattern(String),
    Handler(String),
}

impl Error {
    pub(crate) fn invalid(method: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn out_of_range(method: &str, index: usize, len: usize) -> Self {
        Self::OutOfRange {
            method: method.to_string(),
            index,
            len,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { method, message } => {
                write!(f, "invalid argument for {method}: {message}")
            }
            Self::OutOfRange { method, index, len } => {
                write!(f, "index out of range for {method}: {index} (len {len})")
            }
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::CssParse(msg) => write!(f, "css parse error: {msg}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::Dom(msg) => write!(f, "dom error: {msg}"),
            Self::Pattern(msg) => write!(f, "pattern error: {msg}"),
            Self::Handler(msg) => write!(f, "handler error: {msg}"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests;
