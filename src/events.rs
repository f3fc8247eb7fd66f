//! Bookkeeping for listeners attached through an element wrapper.
//!
//! Every [`ListenerRecord`] pairs the caller's [`EventHandler`] with the
//! [`NativeListener`] actually attached to the platform, so listeners can be
//! counted and detached later by event name, by handler, or all at once.
//! Only listeners registered through an [`EventRegistry`] are visible to it;
//! listeners attached straight to the [`Document`] are out of its reach.

use std::fmt;
use std::rc::Rc;

use crate::document::Document;
use crate::dom::NodeId;
use crate::runtime_state::{Event, NativeListener};
use crate::{Error, Result};

type HandlerFn = dyn Fn(&Document, &mut Event) -> Result<()>;

/// A caller-supplied event callback.
///
/// Handlers are compared by identity: clones of one handler are equal, while
/// two handlers built from the same closure source are not.
#[derive(Clone)]
pub struct EventHandler {
    callback: Rc<HandlerFn>,
}

impl EventHandler {
    pub fn new(callback: impl Fn(&Document, &mut Event) -> Result<()> + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }

    pub fn call(&self, document: &Document, event: &mut Event) -> Result<()> {
        (self.callback)(document, event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EventHandler {}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.callback).cast::<()>())
    }
}

/// The platform side of listener bookkeeping.
pub trait ListenerHost {
    /// Attaches `listener` to `node` for `native_name`.
    fn subscribe(&self, node: NodeId, native_name: &str, listener: &NativeListener) -> Result<()>;

    /// Detaches `listener` by identity. Detaching a listener that is not
    /// attached is a no-op.
    fn unsubscribe(&self, node: NodeId, native_name: &str, listener: &NativeListener)
    -> Result<()>;
}

/// Enter/leave events derived from native hover events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizedEvent {
    MouseEnter,
    MouseLeave,
}

impl SynthesizedEvent {
    pub fn from_public_name(name: &str) -> Option<Self> {
        match name {
            "mouseenter" => Some(Self::MouseEnter),
            "mouseleave" => Some(Self::MouseLeave),
            _ => None,
        }
    }

    pub fn public_name(self) -> &'static str {
        match self {
            Self::MouseEnter => "mouseenter",
            Self::MouseLeave => "mouseleave",
        }
    }

    pub fn native_name(self) -> &'static str {
        match self {
            Self::MouseEnter => "mouseover",
            Self::MouseLeave => "mouseout",
        }
    }

    /// Wraps `handler` in the hover boundary filter.
    ///
    /// The handler runs only when the native event targets the node the
    /// listener is attached to and the related node is not a direct child of
    /// it. Containment is checked one level deep: a pointer arriving from a
    /// grandchild still fires the handler. A missing related node means the
    /// pointer crossed in from outside the document, which also fires.
    pub fn boundary_listener(self, handler: &EventHandler) -> NativeListener {
        let handler = handler.clone();
        NativeListener::new(move |document, event| {
            let node = event.current_target();
            if event.target() != node {
                return Ok(());
            }
            if let Some(related) = event.related_target() {
                if document.parent_node(related) == Some(node) {
                    return Ok(());
                }
            }
            handler.call(document, event)
        })
    }
}

/// Maps a public event name to the native event it is built on.
pub fn native_event_name(public_name: &str) -> &str {
    SynthesizedEvent::from_public_name(public_name)
        .map(SynthesizedEvent::native_name)
        .unwrap_or(public_name)
}

pub(crate) fn validate_event_name(method: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid(method, "event name must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(Error::invalid(
            method,
            format!("event name {name:?} must not contain whitespace"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ListenerRecord {
    node: NodeId,
    public_name: String,
    native_name: String,
    user_handler: EventHandler,
    native_handler: NativeListener,
}

impl ListenerRecord {
    /// The node the native listener was attached to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    pub fn native_name(&self) -> &str {
        &self.native_name
    }

    pub fn user_handler(&self) -> &EventHandler {
        &self.user_handler
    }

    pub fn native_handler(&self) -> &NativeListener {
        &self.native_handler
    }
}

/// Selects records by public event name and/or handler identity. With
/// neither set, every record matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerFilter<'a> {
    name: Option<&'a str>,
    handler: Option<&'a EventHandler>,
}

impl<'a> ListenerFilter<'a> {
    pub fn new(name: Option<&'a str>, handler: Option<&'a EventHandler>) -> Self {
        Self { name, handler }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn name(name: &'a str) -> Self {
        Self::new(Some(name), None)
    }

    pub fn handler(handler: &'a EventHandler) -> Self {
        Self::new(None, Some(handler))
    }

    pub fn name_and_handler(name: &'a str, handler: &'a EventHandler) -> Self {
        Self::new(Some(name), Some(handler))
    }

    fn validate(&self, method: &str) -> Result<()> {
        match self.name {
            Some(name) => validate_event_name(method, name),
            None => Ok(()),
        }
    }

    pub fn matches(&self, record: &ListenerRecord) -> bool {
        self.name.is_none_or(|name| record.public_name == name)
            && self
                .handler
                .is_none_or(|handler| record.user_handler == *handler)
    }
}

/// The ordered listener records of one wrapped element.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
    records: Vec<ListenerRecord>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `native_handler` on `host` and appends a record for it.
    ///
    /// Nothing is deduplicated: registering one handler twice yields two
    /// records and two subscriptions.
    pub fn register<H: ListenerHost + ?Sized>(
        &mut self,
        host: &H,
        node: NodeId,
        public_name: &str,
        native_name: &str,
        user_handler: &EventHandler,
        native_handler: NativeListener,
    ) -> Result<()> {
        validate_event_name("register", public_name)?;
        validate_event_name("register", native_name)?;

        host.subscribe(node, native_name, &native_handler)?;
        self.records.push(ListenerRecord {
            node,
            public_name: public_name.to_string(),
            native_name: native_name.to_string(),
            user_handler: user_handler.clone(),
            native_handler,
        });
        Ok(())
    }

    /// Registers `handler` for `public_name`, wrapping it in the hover
    /// boundary filter when the name is a synthesized event.
    pub fn register_handler<H: ListenerHost + ?Sized>(
        &mut self,
        host: &H,
        node: NodeId,
        public_name: &str,
        handler: &EventHandler,
    ) -> Result<()> {
        validate_event_name("register", public_name)?;
        let (native_name, native_handler) = match SynthesizedEvent::from_public_name(public_name) {
            Some(synthesized) => (
                synthesized.native_name(),
                synthesized.boundary_listener(handler),
            ),
            None => (public_name, forwarding_listener(handler)),
        };
        self.register(host, node, public_name, native_name, handler, native_handler)
    }

    /// Unsubscribes and drops every record matching `filter`, returning how
    /// many were removed. Each listener is detached from the node it was
    /// registered on. Matching nothing is not an error.
    pub fn unregister<H: ListenerHost + ?Sized>(
        &mut self,
        host: &H,
        filter: &ListenerFilter<'_>,
    ) -> Result<usize> {
        filter.validate("unregister")?;

        let mut removed = 0usize;
        for index in (0..self.records.len()).rev() {
            if !filter.matches(&self.records[index]) {
                continue;
            }
            let record = &self.records[index];
            host.unsubscribe(record.node, &record.native_name, &record.native_handler)?;
            self.records.remove(index);
            removed += 1;
        }
        Ok(removed)
    }

    pub fn count(&self, filter: &ListenerFilter<'_>) -> Result<usize> {
        filter.validate("count")?;
        Ok(self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .count())
    }

    pub fn records(&self) -> &[ListenerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// A fresh allocation per record keeps platform dedupe from merging
// registrations of the same handler.
fn forwarding_listener(handler: &EventHandler) -> NativeListener {
    let handler = handler.clone();
    NativeListener::new(move |document, event| handler.call(document, event))
}
