use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::document::Document;
use crate::dom::NodeId;

type ListenerFn = dyn Fn(&Document, &mut Event) -> Result<()>;

/// A callback attached to the native listener table of a [`Document`].
///
/// Identity is the identity of the shared allocation: clones compare equal,
/// two listeners built from identical closures do not.
#[derive(Clone)]
pub struct NativeListener {
    callback: Rc<ListenerFn>,
}

impl NativeListener {
    pub fn new(callback: impl Fn(&Document, &mut Event) -> Result<()> + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }

    pub(crate) fn call(&self, document: &Document, event: &mut Event) -> Result<()> {
        (self.callback)(document, event)
    }
}

impl PartialEq for NativeListener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NativeListener {}

impl fmt::Debug for NativeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeListener({:p})", Rc::as_ptr(&self.callback).cast::<()>())
    }
}

/// Parameters for a synthetic dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInit {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub related_target: Option<NodeId>,
}

impl EventInit {
    /// A bubbling, cancelable event with no related target.
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: true,
            cancelable: true,
            related_target: None,
        }
    }

    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    pub fn not_cancelable(mut self) -> Self {
        self.cancelable = false;
        self
    }

    pub fn with_related_target(mut self, related: Option<NodeId>) -> Self {
        self.related_target = related;
        self
    }
}

/// The event object handed to listeners during dispatch.
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) event_type: String,
    pub(crate) target: NodeId,
    pub(crate) current_target: NodeId,
    pub(crate) related_target: Option<NodeId>,
    pub(crate) bubbles: bool,
    pub(crate) cancelable: bool,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
    pub(crate) immediate_propagation_stopped: bool,
}

impl Event {
    pub(crate) fn new(init: &EventInit, target: NodeId) -> Self {
        Self {
            event_type: init.event_type.clone(),
            target,
            current_target: target,
            related_target: init.related_target,
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    pub fn related_target(&self) -> Option<NodeId> {
        self.related_target
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredListener {
    pub(crate) listener: NativeListener,
    pub(crate) once: bool,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ListenerStore {
    pub(crate) map: HashMap<NodeId, HashMap<String, Vec<StoredListener>>>,
}

impl ListenerStore {
    /// Returns false when the same listener is already attached for this
    /// node and event type.
    pub(crate) fn add(
        &mut self,
        node_id: NodeId,
        event: &str,
        listener: NativeListener,
        once: bool,
    ) -> bool {
        let listeners = self
            .map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default();

        if listeners.iter().any(|existing| existing.listener == listener) {
            return false;
        }
        listeners.push(StoredListener { listener, once });
        true
    }

    pub(crate) fn remove(&mut self, node_id: NodeId, event: &str, listener: &NativeListener) -> bool {
        let Some(events) = self.map.get_mut(&node_id) else {
            return false;
        };
        let Some(listeners) = events.get_mut(event) else {
            return false;
        };

        let Some(pos) = listeners.iter().position(|stored| stored.listener == *listener) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            events.remove(event);
        }
        if events.is_empty() {
            self.map.remove(&node_id);
        }
        true
    }

    pub(crate) fn contains(&self, node_id: NodeId, event: &str, listener: &NativeListener) -> bool {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .is_some_and(|listeners| listeners.iter().any(|stored| stored.listener == *listener))
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str) -> Vec<StoredListener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, node_id: NodeId, event: &str) -> usize {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) events: bool,
    pub(crate) listeners: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            listeners: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: true,
        }
    }
}

impl TraceState {
    pub(crate) fn line(&mut self, line: String) {
        if !self.enabled {
            return;
        }
        if self.to_stderr {
            eprintln!("{line}");
        }
        if self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub(crate) fn event_line(&mut self, line: String) {
        if self.events {
            self.line(line);
        }
    }

    pub(crate) fn listener_line(&mut self, line: String) {
        if self.listeners {
            self.line(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_dedupes_identical_listener_but_keeps_distinct_ones() {
        let mut store = ListenerStore::default();
        let node = NodeId(3);
        let first = NativeListener::new(|_, _| Ok(()));
        let second = NativeListener::new(|_, _| Ok(()));

        assert!(store.add(node, "click", first.clone(), false));
        assert!(!store.add(node, "click", first.clone(), false));
        assert!(store.add(node, "click", second.clone(), false));
        assert_eq!(store.count(node, "click"), 2);

        assert!(store.remove(node, "click", &first));
        assert!(!store.remove(node, "click", &first));
        assert!(store.contains(node, "click", &second));
        assert!(store.remove(node, "click", &second));
        assert!(store.map.is_empty());
    }

    #[test]
    fn trace_state_drops_oldest_line_past_limit() {
        let mut trace = TraceState {
            enabled: true,
            to_stderr: false,
            log_limit: 2,
            ..TraceState::default()
        };
        trace.line("a".into());
        trace.line("b".into());
        trace.line("c".into());
        assert_eq!(trace.logs.iter().cloned().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn prevent_default_is_ignored_for_non_cancelable_events() {
        let init = EventInit::new("scroll").not_cancelable();
        let mut event = Event::new(&init, NodeId(1));
        event.prevent_default();
        assert!(!event.default_prevented());
    }
}
