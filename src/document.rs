use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::css::{CssRule, StyleSheet, StyleSheetId};
use crate::dom::{Dom, InsertPosition, NodeData, NodeId, NodeKind, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::events::ListenerHost;
use crate::html;
use crate::runtime_state::{
    Event, EventInit, ListenerStore, NativeListener, ReadyState, TraceState,
};
use crate::{Error, Result};

const DEFAULT_DISPATCH_DEPTH_LIMIT: usize = 64;

/// Geometry a host attaches to an element in place of a layout engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutBox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offset {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub parent: Option<NodeId>,
}

#[derive(Debug)]
struct DocumentState {
    dom: Dom,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    listeners: ListenerStore,
    ready_state: ReadyState,
    active_element: Option<NodeId>,
    layout: HashMap<NodeId, LayoutBox>,
    style_sheets: Vec<StyleSheet>,
    trace: TraceState,
    dispatch_depth: usize,
    dispatch_depth_limit: usize,
}

impl DocumentState {
    fn new(ready_state: ReadyState) -> Self {
        let mut dom = Dom::new();
        let html = dom.create_element(Some(dom.root), "html", BTreeMap::new());
        let head = dom.create_element(Some(html), "head", BTreeMap::new());
        let body = dom.create_element(Some(html), "body", BTreeMap::new());
        Self {
            dom,
            html,
            head,
            body,
            listeners: ListenerStore::default(),
            ready_state,
            active_element: None,
            layout: HashMap::new(),
            style_sheets: Vec::new(),
            trace: TraceState::default(),
            dispatch_depth: 0,
            dispatch_depth_limit: DEFAULT_DISPATCH_DEPTH_LIMIT,
        }
    }

    fn node_label(&self, node: NodeId) -> String {
        if node == self.dom.root {
            return "document".to_string();
        }
        if let Some(id) = self.dom.attr(node, "id") {
            if !id.is_empty() {
                return format!("#{id}");
            }
        }
        self.dom
            .tag_name(node)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("node-{}", node.0))
    }

    fn trace_enabled(&self) -> bool {
        self.trace.enabled
    }
}

/// Shared handle to one in-memory document.
///
/// Cloning is cheap and every clone sees the same tree, listener table and
/// trace log. The handle is single-threaded.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentState>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &state.dom.nodes.len())
            .field("ready_state", &state.ready_state)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty, fully loaded document.
    pub fn new() -> Self {
        Self::with_state(ReadyState::Complete)
    }

    /// An empty document that has not finished loading yet. Drive it with
    /// [`Document::set_ready_state`].
    pub fn loading() -> Self {
        Self::with_state(ReadyState::Loading)
    }

    /// A loaded document whose `<body>` holds `body_html`.
    pub fn from_html(body_html: &str) -> Result<Self> {
        let document = Self::new();
        let body = document.body();
        document.with_dom_mut(|dom| dom.set_inner_html(body, body_html))?;
        Ok(document)
    }

    fn with_state(ready_state: ReadyState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocumentState::new(ready_state))),
        }
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn with_dom<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.inner.borrow().dom)
    }

    pub(crate) fn with_dom_mut<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.inner.borrow_mut().dom)
    }

    pub(crate) fn ensure_node(&self, method: &str, node: NodeId) -> Result<()> {
        self.with_dom(|dom| dom.ensure_node(method, node))
    }

    pub(crate) fn ensure_element(&self, method: &str, node: NodeId) -> Result<()> {
        self.with_dom(|dom| {
            dom.ensure_node(method, node)?;
            match dom.element(node) {
                Some(_) => Ok(()),
                None => Err(Error::invalid(method, "node is not an element")),
            }
        })
    }

    pub fn document_node(&self) -> NodeId {
        self.inner.borrow().dom.root
    }

    pub fn document_element(&self) -> NodeId {
        self.inner.borrow().html
    }

    pub fn head(&self) -> NodeId {
        self.inner.borrow().head
    }

    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.with_dom(|dom| dom.is_valid_node(node).then(|| dom.kind(node)))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.with_dom(|dom| dom.tag_name(node).map(ToOwned::to_owned))
    }

    pub fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.with_dom(|dom| dom.parent(node))
    }

    pub fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.with_dom(|dom| {
            if dom.is_valid_node(node) {
                dom.children(node).to_vec()
            } else {
                Vec::new()
            }
        })
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.with_dom(|dom| dom.is_valid_node(node) && dom.is_connected(node))
    }

    /// True when `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.with_dom(|dom| {
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if current == ancestor {
                    return true;
                }
                cursor = dom.parent(current);
            }
            false
        })
    }

    pub fn create_element(&self, tag_name: &str) -> Result<NodeId> {
        let valid = !tag_name.is_empty()
            && tag_name.starts_with(|c: char| c.is_ascii_alphabetic())
            && tag_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if !valid {
            return Err(Error::invalid(
                "createElement",
                format!("invalid tag name {tag_name:?}"),
            ));
        }
        Ok(self.with_dom_mut(|dom| dom.create_element(None, tag_name, BTreeMap::new())))
    }

    pub fn create_text_node(&self, text: &str) -> NodeId {
        self.with_dom_mut(|dom| dom.create_node(None, NodeData::Text(text.to_string())))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.with_dom_mut(|dom| dom.create_node(None, NodeData::Comment(text.to_string())))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.with_dom_mut(|dom| dom.create_node(None, NodeData::Fragment))
    }

    /// Parses `markup` into a detached fragment node.
    pub fn parse_fragment(&self, markup: &str) -> Result<NodeId> {
        let parsed = html::parse_fragment(markup)?;
        Ok(self.with_dom_mut(|dom| dom.import_subtree(&parsed, parsed.root, None)))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let root = self.document_node();
        self.with_dom(|dom| dom.query_selector_from(root, selector))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let root = self.document_node();
        self.with_dom(|dom| dom.query_selector_all_from(root, selector))
    }

    /// Like [`Document::query_selector_all`], restricted to descendants of
    /// `root`.
    pub fn query_selector_all_in(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        self.ensure_node("querySelectorAll", root)?;
        self.with_dom(|dom| dom.query_selector_all_from(root, selector))
    }

    pub fn query_selector_in(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.ensure_node("querySelector", root)?;
        self.with_dom(|dom| dom.query_selector_from(root, selector))
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        self.ensure_node("matches", node)?;
        self.with_dom(|dom| dom.matches_selector(node, selector))
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_dom(|dom| dom.attr(node, name))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.ensure_node("setAttribute", node)?;
        self.with_dom_mut(|dom| dom.set_attr(node, name, value))
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<()> {
        self.ensure_node("removeAttribute", node)?;
        self.with_dom_mut(|dom| dom.remove_attr(node, name))
    }

    pub fn text_content(&self, node: NodeId) -> Result<String> {
        self.ensure_node("textContent", node)?;
        Ok(self.with_dom(|dom| dom.text_content(node)))
    }

    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<()> {
        self.ensure_node("textContent", node)?;
        self.with_dom_mut(|dom| dom.set_text_content(node, text))
    }

    pub fn inner_html(&self, node: NodeId) -> Result<String> {
        self.ensure_node("innerHTML", node)?;
        Ok(self.with_dom(|dom| dom.inner_html(node)))
    }

    pub fn set_inner_html(&self, node: NodeId, markup: &str) -> Result<()> {
        self.ensure_node("innerHTML", node)?;
        self.with_dom_mut(|dom| dom.set_inner_html(node, markup))
    }

    pub fn outer_html(&self, node: NodeId) -> Result<String> {
        self.ensure_node("outerHTML", node)?;
        Ok(self.with_dom(|dom| dom.serialize_node(node)))
    }

    pub(crate) fn insert_html(&self, node: NodeId, position: InsertPosition, markup: &str) -> Result<()> {
        self.with_dom_mut(|dom| dom.insert_html(node, position, markup))
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.with_dom_mut(|dom| dom.append_child(parent, child))
    }

    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.with_dom_mut(|dom| dom.insert_before(parent, child, reference))
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.with_dom_mut(|dom| dom.remove_child(parent, child))
    }

    /// Detaches `node` from its parent; detached nodes are left alone.
    pub fn remove(&self, node: NodeId) -> Result<()> {
        self.ensure_node("remove", node)?;
        self.with_dom_mut(|dom| dom.remove_node(node))?;
        let mut state = self.inner.borrow_mut();
        if state
            .active_element
            .is_some_and(|active| !state.dom.is_connected(active))
        {
            state.active_element = None;
        }
        Ok(())
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.inner.borrow().active_element
    }

    /// Moves focus to `node`, blurring the previous active element first.
    /// Disabled and detached elements ignore the call.
    pub fn focus(&self, node: NodeId) -> Result<()> {
        self.ensure_element("focus", node)?;
        let focusable = self.with_dom(|dom| !dom.disabled(node) && dom.is_connected(node));
        if !focusable || self.active_element() == Some(node) {
            return Ok(());
        }
        if let Some(previous) = self.active_element() {
            self.blur(previous)?;
        }
        self.inner.borrow_mut().active_element = Some(node);
        self.dispatch_event(node, EventInit::new("focusin").not_cancelable())?;
        self.dispatch_event(node, EventInit::new("focus").non_bubbling().not_cancelable())?;
        Ok(())
    }

    pub fn blur(&self, node: NodeId) -> Result<()> {
        self.ensure_element("blur", node)?;
        if self.active_element() != Some(node) {
            return Ok(());
        }
        self.inner.borrow_mut().active_element = None;
        self.dispatch_event(node, EventInit::new("focusout").not_cancelable())?;
        self.dispatch_event(node, EventInit::new("blur").non_bubbling().not_cancelable())?;
        Ok(())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.borrow().ready_state
    }

    /// Advances the ready state, firing `DOMContentLoaded` on reaching
    /// interactive and `load` on reaching complete.
    pub fn set_ready_state(&self, next: ReadyState) -> Result<()> {
        let current = self.ready_state();
        if next < current {
            return Err(Error::invalid(
                "setReadyState",
                format!("cannot go from {} back to {}", current.as_str(), next.as_str()),
            ));
        }
        if next == current {
            return Ok(());
        }

        let root = self.document_node();
        if current == ReadyState::Loading {
            self.inner.borrow_mut().ready_state = ReadyState::Interactive;
            self.dispatch_event(root, EventInit::new("DOMContentLoaded").not_cancelable())?;
        }
        if next == ReadyState::Complete {
            self.inner.borrow_mut().ready_state = ReadyState::Complete;
            self.dispatch_event(root, EventInit::new("load").non_bubbling().not_cancelable())?;
        }
        Ok(())
    }

    pub fn set_layout_box(&self, node: NodeId, layout: LayoutBox) -> Result<()> {
        self.ensure_element("setLayoutBox", node)?;
        self.inner.borrow_mut().layout.insert(node, layout);
        Ok(())
    }

    /// The box set by the host, or zeros.
    pub fn layout_box(&self, node: NodeId) -> LayoutBox {
        self.inner
            .borrow()
            .layout
            .get(&node)
            .copied()
            .unwrap_or_default()
    }

    /// Nearest positioned ancestor element, falling back to `<body>`.
    pub fn offset_parent(&self, node: NodeId) -> Option<NodeId> {
        let state = self.inner.borrow();
        let dom = &state.dom;
        if dom.element(node).is_none()
            || node == state.body
            || node == state.html
            || !dom.is_connected(node)
        {
            return None;
        }

        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if dom.style_get(current, "display").ok().as_deref() == Some("none") {
                return None;
            }
            cursor = dom.parent(current).filter(|parent| dom.element(*parent).is_some());
        }

        let mut cursor = dom.parent(node);
        while let Some(ancestor) = cursor {
            if ancestor == state.body {
                break;
            }
            let position = dom.style_get(ancestor, "position").unwrap_or_default();
            if !position.is_empty() && position != "static" {
                return Some(ancestor);
            }
            cursor = dom.parent(ancestor);
        }
        Some(state.body)
    }

    /// Appends a `<style>` element to `<head>` and returns its sheet.
    pub fn create_style_sheet(&self) -> Result<StyleSheetId> {
        let head = self.head();
        let style = self.create_element("style")?;
        self.set_attribute(style, "type", "text/css")?;
        self.append_child(head, style)?;

        let mut state = self.inner.borrow_mut();
        state.style_sheets.push(StyleSheet::new(style));
        Ok(StyleSheetId(state.style_sheets.len() - 1))
    }

    fn with_sheet_mut<R>(
        &self,
        method: &str,
        sheet: StyleSheetId,
        f: impl FnOnce(&mut StyleSheet) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.inner.borrow_mut();
        let sheet = state
            .style_sheets
            .get_mut(sheet.0)
            .ok_or_else(|| Error::invalid(method, format!("unknown style sheet {}", sheet.0)))?;
        f(sheet)
    }

    pub fn insert_rule(&self, sheet: StyleSheetId, rule: &str, index: usize) -> Result<usize> {
        self.with_sheet_mut("insertRule", sheet, |sheet| sheet.insert_rule(rule, index))
    }

    pub fn delete_rule(&self, sheet: StyleSheetId, index: usize) -> Result<()> {
        self.with_sheet_mut("deleteRule", sheet, |sheet| sheet.delete_rule(index))
    }

    pub fn css_rules(&self, sheet: StyleSheetId) -> Result<Vec<CssRule>> {
        self.with_sheet_mut("cssRules", sheet, |sheet| Ok(sheet.rules.clone()))
    }

    /// The `<style>` element backing `sheet`.
    pub fn style_sheet_owner(&self, sheet: StyleSheetId) -> Result<NodeId> {
        self.with_sheet_mut("ownerNode", sheet, |sheet| Ok(sheet.owner))
    }

    /// Attaches `listener`; returns false when it was already attached for
    /// this node and event type.
    pub fn add_event_listener(&self, node: NodeId, event_type: &str, listener: &NativeListener) -> Result<bool> {
        self.attach_listener(node, event_type, listener, false)
    }

    /// Attaches `listener` so that it is detached before its first call.
    pub fn add_event_listener_once(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &NativeListener,
    ) -> Result<bool> {
        self.attach_listener(node, event_type, listener, true)
    }

    fn attach_listener(&self, node: NodeId, event_type: &str, listener: &NativeListener, once: bool) -> Result<bool> {
        self.ensure_node("addEventListener", node)?;
        if event_type.is_empty() {
            return Err(Error::invalid("addEventListener", "event type must not be empty"));
        }
        let mut state = self.inner.borrow_mut();
        let added = state.listeners.add(node, event_type, listener.clone(), once);
        if added && state.trace_enabled() {
            let line = format!("[listener] add {} node={}", event_type, state.node_label(node));
            state.trace.listener_line(line);
        }
        Ok(added)
    }

    /// Detaches `listener`; returns false when it was not attached.
    pub fn remove_event_listener(&self, node: NodeId, event_type: &str, listener: &NativeListener) -> bool {
        let mut state = self.inner.borrow_mut();
        let removed = state.listeners.remove(node, event_type, listener);
        if removed && state.trace_enabled() {
            let line = format!("[listener] remove {} node={}", event_type, state.node_label(node));
            state.trace.listener_line(line);
        }
        removed
    }

    /// Native listeners attached to `node` for `event_type`, including ones
    /// added outside any registry.
    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.inner.borrow().listeners.count(node, event_type)
    }

    /// Dispatches a bubbling, cancelable event of `event_type` at `target`.
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> Result<bool> {
        self.dispatch_event(target, EventInit::new(event_type))
    }

    /// Dispatches a pointer event carrying `related` as its related target.
    pub fn dispatch_mouse(&self, target: NodeId, event_type: &str, related: Option<NodeId>) -> Result<bool> {
        self.dispatch_event(target, EventInit::new(event_type).with_related_target(related))
    }

    /// Runs the listeners along the path from `target` up to the document.
    /// Returns false when a listener called `prevent_default`.
    pub fn dispatch_event(&self, target: NodeId, init: EventInit) -> Result<bool> {
        self.ensure_node("dispatchEvent", target)?;
        if init.event_type.is_empty() {
            return Err(Error::invalid("dispatchEvent", "event type must not be empty"));
        }
        {
            let mut state = self.inner.borrow_mut();
            if state.dispatch_depth >= state.dispatch_depth_limit {
                return Err(Error::Dom(format!(
                    "event dispatch exceeded nesting limit of {} while dispatching {}",
                    state.dispatch_depth_limit, init.event_type
                )));
            }
            state.dispatch_depth += 1;
        }

        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.run_dispatch(target, &init)
        });
        self.inner.borrow_mut().dispatch_depth -= 1;
        result
    }

    fn run_dispatch(&self, target: NodeId, init: &EventInit) -> Result<bool> {
        let path = self.with_dom(|dom| {
            let mut path = vec![target];
            if init.bubbles {
                let mut cursor = dom.parent(target);
                while let Some(node) = cursor {
                    path.push(node);
                    cursor = dom.parent(node);
                }
            }
            path
        });

        let mut event = Event::new(init, target);
        for node in path {
            event.current_target = node;
            if let Err(err) = self.invoke_listeners(node, &mut event) {
                self.trace_event_done(&event, "error");
                return Err(err);
            }
            if event.propagation_stopped {
                break;
            }
        }
        self.trace_event_done(&event, "completed");
        Ok(!event.default_prevented)
    }

    fn invoke_listeners(&self, node: NodeId, event: &mut Event) -> Result<()> {
        let listeners = self.inner.borrow().listeners.get(node, &event.event_type);
        for stored in listeners {
            {
                let mut state = self.inner.borrow_mut();
                // Removed by an earlier listener of this dispatch.
                if !state.listeners.contains(node, &event.event_type, &stored.listener) {
                    continue;
                }
                if stored.once {
                    state.listeners.remove(node, &event.event_type, &stored.listener);
                }
                if state.trace_enabled() {
                    let line = format!(
                        "[event] {} target={} current={} default_prevented={}",
                        event.event_type,
                        state.node_label(event.target),
                        state.node_label(event.current_target),
                        event.default_prevented
                    );
                    state.trace.event_line(line);
                }
            }
            stored.listener.call(self, event)?;
            if event.immediate_propagation_stopped {
                break;
            }
        }
        Ok(())
    }

    fn trace_event_done(&self, event: &Event, outcome: &str) {
        let mut state = self.inner.borrow_mut();
        if !state.trace_enabled() {
            return;
        }
        let line = format!(
            "[event] done {} target={} current={} outcome={} default_prevented={} propagation_stopped={}",
            event.event_type,
            state.node_label(event.target),
            state.node_label(event.current_target),
            outcome,
            event.default_prevented,
            event.propagation_stopped
        );
        state.trace.event_line(line);
    }

    pub fn enable_trace(&self, enabled: bool) {
        self.inner.borrow_mut().trace.enabled = enabled;
    }

    pub fn set_trace_events(&self, enabled: bool) {
        self.inner.borrow_mut().trace.events = enabled;
    }

    pub fn set_trace_listeners(&self, enabled: bool) {
        self.inner.borrow_mut().trace.listeners = enabled;
    }

    pub fn set_trace_stderr(&self, enabled: bool) {
        self.inner.borrow_mut().trace.to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::invalid(
                "setTraceLogLimit",
                "set_trace_log_limit requires at least 1 entry",
            ));
        }
        let mut state = self.inner.borrow_mut();
        state.trace.log_limit = max_entries;
        while state.trace.logs.len() > max_entries {
            state.trace.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&self) -> Vec<String> {
        self.inner.borrow_mut().trace.logs.drain(..).collect()
    }

    pub fn set_dispatch_depth_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(Error::invalid(
                "setDispatchDepthLimit",
                "dispatch depth limit must be at least 1",
            ));
        }
        self.inner.borrow_mut().dispatch_depth_limit = limit;
        Ok(())
    }
}

impl ListenerHost for Document {
    fn subscribe(&self, node: NodeId, native_name: &str, listener: &NativeListener) -> Result<()> {
        self.add_event_listener(node, native_name, listener).map(|_| ())
    }

    fn unsubscribe(&self, node: NodeId, native_name: &str, listener: &NativeListener) -> Result<()> {
        self.remove_event_listener(node, native_name, listener);
        Ok(())
    }
}
