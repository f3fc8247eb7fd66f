use std::collections::BTreeMap;

use crate::document::{Document, Offset};
use crate::dom::{self, InsertPosition, NodeId};
use crate::events::{EventHandler, EventRegistry, ListenerFilter, SynthesizedEvent, validate_event_name};
use crate::pattern::Pattern;
use crate::runtime_state::EventInit;
use crate::{Error, Result};

/// Anything that designates a node of a document.
pub trait AsNode {
    fn as_node(&self) -> NodeId;
}

impl AsNode for NodeId {
    fn as_node(&self) -> NodeId {
        *self
    }
}

impl AsNode for ElementWrapper {
    fn as_node(&self) -> NodeId {
        self.node
    }
}

impl<T: AsNode + ?Sized> AsNode for &T {
    fn as_node(&self) -> NodeId {
        (**self).as_node()
    }
}

/// Content for [`ElementWrapper::append`] and [`ElementWrapper::prepend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content<'a> {
    /// Markup parsed and inserted as new nodes.
    Html(&'a str),
    /// An existing node, moved from wherever it currently is.
    Node(NodeId),
}

impl<'a> From<&'a str> for Content<'a> {
    fn from(value: &'a str) -> Self {
        Self::Html(value)
    }
}

impl From<NodeId> for Content<'_> {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

impl From<&ElementWrapper> for Content<'_> {
    fn from(value: &ElementWrapper) -> Self {
        Self::Node(value.node)
    }
}

/// A chainable handle around one node.
///
/// Mutators return `&mut Self` so calls can be chained with `?`. Each wrapper
/// keeps its own [`EventRegistry`]: listeners added through one wrapper are
/// invisible to another wrapper of the same node.
#[derive(Debug)]
pub struct ElementWrapper {
    document: Document,
    node: NodeId,
    registry: EventRegistry,
    old_display: String,
}

impl ElementWrapper {
    pub(crate) fn new(document: Document, node: NodeId) -> Result<Self> {
        document.ensure_node("wrap", node)?;
        Ok(Self {
            document,
            node,
            registry: EventRegistry::new(),
            old_display: String::new(),
        })
    }

    fn wrap(&self, node: NodeId) -> Result<Self> {
        Self::new(self.document.clone(), node)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn same_node(&self, other: &impl AsNode) -> bool {
        self.node == other.as_node()
    }

    pub fn offset_left(&self) -> i64 {
        self.document.layout_box(self.node).left
    }

    pub fn offset_top(&self) -> i64 {
        self.document.layout_box(self.node).top
    }

    pub fn offset_width(&self) -> i64 {
        self.document.layout_box(self.node).width
    }

    pub fn offset_height(&self) -> i64 {
        self.document.layout_box(self.node).height
    }

    pub fn offset_parent(&self) -> Option<NodeId> {
        self.document.offset_parent(self.node)
    }

    pub fn offset(&self) -> Offset {
        let layout = self.document.layout_box(self.node);
        Offset {
            left: layout.left,
            top: layout.top,
            width: layout.width,
            height: layout.height,
            parent: self.offset_parent(),
        }
    }

    pub fn checked(&self) -> Result<bool> {
        self.document.with_dom(|dom| dom.checked(self.node))
    }

    pub fn set_checked(&mut self, checked: bool) -> Result<&mut Self> {
        self.document
            .with_dom_mut(|dom| dom.set_checked(self.node, checked))?;
        Ok(self)
    }

    pub fn selected(&self) -> Result<bool> {
        self.document.with_dom(|dom| dom.selected(self.node))
    }

    pub fn set_selected(&mut self, selected: bool) -> Result<&mut Self> {
        self.document
            .with_dom_mut(|dom| dom.set_selected(self.node, selected))?;
        Ok(self)
    }

    /// First descendant matching `selector`.
    pub fn select(&self, selector: &str) -> Result<Option<ElementWrapper>> {
        self.document
            .query_selector_in(self.node, selector)?
            .map(|node| self.wrap(node))
            .transpose()
    }

    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementWrapper>> {
        self.document
            .query_selector_all_in(self.node, selector)?
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    pub fn attrib(&self, name: &str) -> Result<Option<String>> {
        validate_attr_name("attrib", name)?;
        self.document.ensure_element("attrib", self.node)?;
        Ok(self.document.get_attribute(self.node, name))
    }

    pub fn set_attrib(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        validate_attr_name("attrib", name)?;
        self.document.set_attribute(self.node, name, value)?;
        Ok(self)
    }

    pub fn has_attrib(&self, name: &str) -> Result<bool> {
        validate_attr_name("hasAttrib", name)?;
        self.document.with_dom(|dom| dom.has_attr(self.node, name))
    }

    pub fn remove_attrib(&mut self, name: &str) -> Result<&mut Self> {
        validate_attr_name("removeAttrib", name)?;
        self.document.remove_attribute(self.node, name)?;
        Ok(self)
    }

    pub fn value(&self) -> Result<String> {
        self.document.with_dom(|dom| dom.value(self.node))
    }

    pub fn set_value(&mut self, value: &str) -> Result<&mut Self> {
        self.document
            .with_dom_mut(|dom| dom.set_value(self.node, value))?;
        Ok(self)
    }

    /// Required fields must be filled (or checked) and a `pattern` attribute
    /// must match the whole value. Disabled controls are always valid.
    pub fn check_validity(&self) -> Result<bool> {
        self.document.ensure_element("checkValidity", self.node)?;
        let (disabled, required, checkable, checked, value, pattern) =
            self.document.with_dom(|dom| -> Result<_> {
                let input_type = dom
                    .attr(self.node, "type")
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                Ok((
                    dom.disabled(self.node),
                    dom.has_attr(self.node, "required")?,
                    matches!(input_type.as_str(), "checkbox" | "radio"),
                    dom.checked(self.node)?,
                    dom.value(self.node)?,
                    dom.attr(self.node, "pattern"),
                ))
            })?;

        if disabled {
            return Ok(true);
        }
        if checkable {
            return Ok(!required || checked);
        }
        if value.is_empty() {
            return Ok(!required);
        }
        let Some(pattern) = pattern else {
            return Ok(true);
        };
        // Browsers ignore a pattern that does not compile.
        match Pattern::new(&format!("^(?:{pattern})$")) {
            Ok(compiled) => compiled.is_match(&value),
            Err(_) => Ok(true),
        }
    }

    pub fn focus(&mut self) -> Result<&mut Self> {
        self.document.focus(self.node)?;
        Ok(self)
    }

    pub fn blur(&mut self) -> Result<&mut Self> {
        self.document.blur(self.node)?;
        Ok(self)
    }

    pub fn disabled(&self) -> bool {
        self.document.with_dom(|dom| dom.disabled(self.node))
    }

    pub fn set_disabled(&mut self, disabled: bool) -> Result<&mut Self> {
        self.document
            .with_dom_mut(|dom| dom.set_disabled(self.node, disabled))?;
        Ok(self)
    }

    /// Sets the inline width to `px` rounded to whole pixels.
    pub fn width(&mut self, px: f64) -> Result<&mut Self> {
        let width = pixels("width", px)?;
        self.set_style("width", &width)
    }

    pub fn height(&mut self, px: f64) -> Result<&mut Self> {
        let height = pixels("height", px)?;
        self.set_style("height", &height)
    }

    pub fn position(&mut self, left: f64, top: f64) -> Result<&mut Self> {
        let left = pixels("position", left)?;
        let top = pixels("position", top)?;
        self.set_style("left", &left)?.set_style("top", &top)
    }

    pub fn data(&self, key: &str) -> Result<Option<String>> {
        validate_dataset_key(key)?;
        self.document.with_dom(|dom| dom.dataset_get(self.node, key))
    }

    pub fn set_data(&mut self, key: &str, value: &str) -> Result<&mut Self> {
        validate_dataset_key(key)?;
        self.document
            .with_dom_mut(|dom| dom.dataset_set(self.node, key, value))?;
        Ok(self)
    }

    /// Sets several data entries; every key is checked before any is written.
    pub fn set_data_all(&mut self, entries: &[(&str, &str)]) -> Result<&mut Self> {
        for (key, _) in entries {
            validate_dataset_key(key)?;
        }
        self.document.ensure_element("data", self.node)?;
        for (key, value) in entries {
            self.set_data(key, value)?;
        }
        Ok(self)
    }

    /// All data entries keyed by their camelCase names, or `None` when the
    /// element has none.
    pub fn data_all(&self) -> Result<Option<BTreeMap<String, String>>> {
        let entries = self.document.with_dom(|dom| dom.dataset_entries(self.node))?;
        Ok((!entries.is_empty()).then_some(entries))
    }

    /// The inline value of `name`, or an empty string.
    ///
    /// There is no style engine, so this is the declared inline value rather
    /// than a computed one.
    pub fn style(&self, name: &str) -> Result<String> {
        validate_style_name(name)?;
        self.document.with_dom(|dom| dom.style_get(self.node, name))
    }

    pub fn set_style(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        validate_style_name(name)?;
        self.document
            .with_dom_mut(|dom| dom.style_set(self.node, name, value))?;
        Ok(self)
    }

    pub fn set_styles(&mut self, entries: &[(&str, &str)]) -> Result<&mut Self> {
        for (name, _) in entries {
            validate_style_name(name)?;
        }
        self.document.ensure_element("style", self.node)?;
        for (name, value) in entries {
            self.set_style(name, value)?;
        }
        Ok(self)
    }

    /// Replaces the whole class attribute.
    pub fn set_class(&mut self, class_name: &str) -> Result<&mut Self> {
        self.document.set_attribute(self.node, "class", class_name)?;
        Ok(self)
    }

    pub fn add_class(&mut self, class_name: &str) -> Result<&mut Self> {
        self.add_classes(&[class_name])
    }

    pub fn add_classes(&mut self, class_names: &[&str]) -> Result<&mut Self> {
        validate_class_tokens("addClass", class_names)?;
        self.document.with_dom_mut(|dom| {
            class_names
                .iter()
                .try_for_each(|name| dom.class_add(self.node, name))
        })?;
        Ok(self)
    }

    pub fn remove_class(&mut self, class_name: &str) -> Result<&mut Self> {
        self.remove_classes(&[class_name])
    }

    pub fn remove_classes(&mut self, class_names: &[&str]) -> Result<&mut Self> {
        validate_class_tokens("removeClass", class_names)?;
        self.document.with_dom_mut(|dom| {
            class_names
                .iter()
                .try_for_each(|name| dom.class_remove(self.node, name))
        })?;
        Ok(self)
    }

    pub fn toggle_class(&mut self, class_name: &str) -> Result<&mut Self> {
        validate_class_tokens("toggleClass", &[class_name])?;
        self.document
            .with_dom_mut(|dom| dom.class_toggle(self.node, class_name))?;
        Ok(self)
    }

    pub fn contains_class(&self, class_name: &str) -> Result<bool> {
        validate_class_tokens("containsClass", &[class_name])?;
        self.document
            .with_dom(|dom| dom.class_contains(self.node, class_name))
    }

    pub fn text(&self) -> Result<String> {
        self.document.text_content(self.node)
    }

    pub fn set_text(&mut self, text: &str) -> Result<&mut Self> {
        self.document.set_text_content(self.node, text)?;
        Ok(self)
    }

    pub fn html(&self) -> Result<String> {
        self.document.inner_html(self.node)
    }

    pub fn set_html(&mut self, markup: &str) -> Result<&mut Self> {
        self.document.set_inner_html(self.node, markup)?;
        Ok(self)
    }

    pub fn empty(&mut self) -> Result<&mut Self> {
        self.set_html("")
    }

    pub fn child_node(&self, index: usize) -> Result<ElementWrapper> {
        let children = self.document.child_nodes(self.node);
        let node = children
            .get(index)
            .copied()
            .ok_or_else(|| Error::out_of_range("childNode", index, children.len()))?;
        self.wrap(node)
    }

    pub fn child_element(&self, index: usize) -> Result<ElementWrapper> {
        let children = self.document.with_dom(|dom| dom.element_children(self.node));
        let node = children
            .get(index)
            .copied()
            .ok_or_else(|| Error::out_of_range("childElement", index, children.len()))?;
        self.wrap(node)
    }

    pub fn child_elements(&self) -> Result<Vec<ElementWrapper>> {
        self.document
            .with_dom(|dom| dom.element_children(self.node))
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    /// Detaches the direct child `child` and returns a fresh wrapper for it.
    pub fn remove_child(&mut self, child: impl AsNode) -> Result<ElementWrapper> {
        let child = child.as_node();
        self.document.ensure_node("removeChild", child)?;
        self.document.remove_child(self.node, child)?;
        self.wrap(child)
    }

    pub fn append<'a>(&mut self, content: impl Into<Content<'a>>) -> Result<&mut Self> {
        match content.into() {
            Content::Html(markup) => {
                self.document
                    .insert_html(self.node, InsertPosition::BeforeEnd, markup)?;
            }
            Content::Node(node) => self.document.append_child(self.node, node)?,
        }
        Ok(self)
    }

    pub fn prepend<'a>(&mut self, content: impl Into<Content<'a>>) -> Result<&mut Self> {
        match content.into() {
            Content::Html(markup) => {
                self.document
                    .insert_html(self.node, InsertPosition::AfterBegin, markup)?;
            }
            Content::Node(node) => match self.document.child_nodes(self.node).first() {
                Some(first) => self.document.insert_before(self.node, node, *first)?,
                None => self.document.append_child(self.node, node)?,
            },
        }
        Ok(self)
    }

    /// Inserts `node` in front of the direct child `reference`.
    pub fn insert_before(&mut self, node: impl AsNode, reference: impl AsNode) -> Result<&mut Self> {
        self.document
            .insert_before(self.node, node.as_node(), reference.as_node())?;
        Ok(self)
    }

    /// Drops comments and whitespace-only text nodes from the subtree. Text
    /// holding a non-breaking space is kept.
    pub fn cleanup(&mut self) -> Result<&mut Self> {
        self.document
            .with_dom_mut(|dom| dom.remove_blank_nodes(self.node))?;
        Ok(self)
    }

    /// Sets `display: none`, remembering the display to restore in
    /// [`ElementWrapper::show`]. An explicit `"none"` is ignored in favour of
    /// the current or default display. Hiding a hidden element does nothing.
    pub fn hide(&mut self, display: Option<&str>) -> Result<&mut Self> {
        let current = self.style("display")?;
        if current == "none" {
            return Ok(self);
        }

        let explicit = display
            .map(str::trim)
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("none"));
        self.old_display = match explicit {
            Some(explicit) => explicit.to_string(),
            None if !current.is_empty() => current,
            None => {
                let tag = self.document.tag_name(self.node).unwrap_or_default();
                dom::default_display(&tag).to_string()
            }
        };
        self.set_style("display", "none")
    }

    pub fn show(&mut self) -> Result<&mut Self> {
        let display = self.old_display.clone();
        self.set_style("display", &display)
    }

    pub fn on_click(&mut self, handler: &EventHandler) -> Result<&mut Self> {
        self.on_event("click", handler)
    }

    /// Removes click listeners added through this wrapper, all of them or
    /// only those of `handler`.
    pub fn off_click(&mut self, handler: Option<&EventHandler>) -> Result<&mut Self> {
        self.off_event(Some("click"), handler)
    }

    /// Adds `handler` for `name`. `mouseenter` and `mouseleave` are
    /// synthesized from `mouseover` and `mouseout`.
    pub fn on_event(&mut self, name: &str, handler: &EventHandler) -> Result<&mut Self> {
        validate_event_name("onEvent", name)?;
        self.registry
            .register_handler(&self.document, self.node, name, handler)?;
        Ok(self)
    }

    pub fn off_event(&mut self, name: Option<&str>, handler: Option<&EventHandler>) -> Result<&mut Self> {
        self.registry
            .unregister(&self.document, &ListenerFilter::new(name, handler))?;
        Ok(self)
    }

    pub fn event_count(&self, name: Option<&str>, handler: Option<&EventHandler>) -> Result<usize> {
        self.registry.count(&ListenerFilter::new(name, handler))
    }

    pub fn on_mouseenter(&mut self, handler: &EventHandler) -> Result<&mut Self> {
        self.on_event(SynthesizedEvent::MouseEnter.public_name(), handler)
    }

    pub fn off_mouseenter(&mut self, handler: Option<&EventHandler>) -> Result<&mut Self> {
        self.off_event(Some(SynthesizedEvent::MouseEnter.public_name()), handler)
    }

    pub fn on_mouseleave(&mut self, handler: &EventHandler) -> Result<&mut Self> {
        self.on_event(SynthesizedEvent::MouseLeave.public_name(), handler)
    }

    pub fn off_mouseleave(&mut self, handler: Option<&EventHandler>) -> Result<&mut Self> {
        self.off_event(Some(SynthesizedEvent::MouseLeave.public_name()), handler)
    }

    /// Dispatches a bubbling, cancelable `click` at this node.
    pub fn trigger_click(&mut self) -> Result<&mut Self> {
        self.document.dispatch_event(self.node, EventInit::new("click"))?;
        Ok(self)
    }
}

fn validate_attr_name(method: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '='));
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(method, format!("invalid attribute name {name:?}")))
    }
}

fn validate_style_name(name: &str) -> Result<()> {
    let valid = !name.trim().is_empty() && !name.trim().contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(Error::invalid("style", format!("invalid style name {name:?}")))
    }
}

fn validate_class_tokens(method: &str, names: &[&str]) -> Result<()> {
    for name in names {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::invalid(
                method,
                format!("class token {name:?} must be non-empty without whitespace"),
            ));
        }
    }
    Ok(())
}

fn validate_dataset_key(key: &str) -> Result<()> {
    if dom::is_valid_dataset_key(key)? && !key.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(Error::invalid("data", format!("invalid data key {key:?}")))
    }
}

fn pixels(method: &str, value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(Error::invalid(method, format!("{value} is not a finite number")));
    }
    let rounded = (value + 0.5).floor();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return Err(Error::invalid(method, format!("{value} is out of pixel range")));
    }
    Ok(format!("{}px", rounded as i64))
}
