use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::css::{parse_style_declarations, prop_to_css_name, serialize_style_declarations};
use crate::html;
use crate::pattern::{self, Pattern};
use crate::{Error, Result};

pub(crate) const STACK_RED_ZONE: usize = 64 * 1024;
pub(crate) const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Handle to a node inside one [`Document`](crate::Document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    Fragment,
}

impl NodeKind {
    /// The numeric `nodeType` a browser reports for this kind.
    pub fn node_type(self) -> u16 {
        match self {
            Self::Element => 1,
            Self::Text => 3,
            Self::Comment => 8,
            Self::Document => 9,
            Self::Fragment => 11,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    Fragment,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) selected: bool,
}

impl Element {
    pub(crate) fn new(tag_name: &str, attrs: BTreeMap<String, String>) -> Self {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let selected = attrs.contains_key("selected");
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs,
            value,
            checked,
            selected,
        }
    }

    pub(crate) fn has_class(&self, class_name: &str) -> bool {
        self.attrs
            .get("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    pub(crate) fn disabled(&self) -> bool {
        self.attrs.contains_key("disabled")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertPosition {
    AfterBegin,
    BeforeEnd,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self::with_root(NodeData::Document)
    }

    pub(crate) fn new_fragment() -> Self {
        Self::with_root(NodeData::Fragment)
    }

    fn with_root(data: NodeData) -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            data,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub(crate) fn create_node(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            data,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: Option<NodeId>,
        tag_name: &str,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        self.create_node(parent, NodeData::Element(Element::new(tag_name, attrs)))
    }

    pub(crate) fn is_valid_node(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub(crate) fn ensure_node(&self, method: &str, node_id: NodeId) -> Result<()> {
        if self.is_valid_node(node_id) {
            Ok(())
        } else {
            Err(Error::invalid(method, format!("unknown node {}", node_id.0)))
        }
    }

    pub(crate) fn kind(&self, node_id: NodeId) -> NodeKind {
        match &self.nodes[node_id.0].data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn require_element(&self, method: &str, node_id: NodeId) -> Result<&Element> {
        self.element(node_id)
            .ok_or_else(|| Error::invalid(method, "target is not an element"))
    }

    fn require_element_mut(&mut self, method: &str, node_id: NodeId) -> Result<&mut Element> {
        self.element_mut(node_id)
            .ok_or_else(|| Error::invalid(method, "target is not an element"))
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0).and_then(|node| node.parent)
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        &self.nodes[node_id.0].children
    }

    pub(crate) fn element_children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes[node_id.0]
            .children
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub(crate) fn is_connected(&self, node_id: NodeId) -> bool {
        let mut cursor = Some(node_id);
        while let Some(node) = cursor {
            if node == self.root {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    pub(crate) fn can_have_children(&self, node_id: NodeId) -> bool {
        matches!(
            self.nodes.get(node_id.0).map(|n| &n.data),
            Some(NodeData::Document | NodeData::Element(_) | NodeData::Fragment)
        )
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match &self.nodes[node_id.0].data {
                NodeData::Document | NodeData::Element(_) | NodeData::Fragment => {
                    let mut out = String::new();
                    for child in &self.nodes[node_id.0].children {
                        if matches!(self.nodes[child.0].data, NodeData::Comment(_)) {
                            continue;
                        }
                        out.push_str(&self.text_content(*child));
                    }
                    out
                }
                NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            }
        })
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        match &mut self.nodes[node_id.0].data {
            NodeData::Text(text) | NodeData::Comment(text) => {
                *text = value.to_string();
                return Ok(());
            }
            NodeData::Document => {
                return Err(Error::Dom("cannot set text content of the document".into()));
            }
            NodeData::Element(_) | NodeData::Fragment => {}
        }
        self.detach_children(node_id);
        if !value.is_empty() {
            self.create_node(Some(node_id), NodeData::Text(value.to_string()));
        }
        if self.tag_name(node_id) == Some("textarea") {
            if let Some(element) = self.element_mut(node_id) {
                element.value = value.to_string();
            }
        }
        Ok(())
    }

    pub(crate) fn detach_children(&mut self, node_id: NodeId) {
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        for child in &self.nodes[node_id.0].children {
            out.push_str(&self.serialize_node(*child));
        }
        out
    }

    pub(crate) fn set_inner_html(&mut self, node_id: NodeId, markup: &str) -> Result<()> {
        if !self.can_have_children(node_id) || node_id == self.root {
            return Err(Error::Dom("innerHTML target cannot hold markup".into()));
        }
        let fragment = html::parse_fragment(markup)?;
        self.detach_children(node_id);
        let children = fragment.nodes[fragment.root.0].children.clone();
        for child in children {
            self.import_subtree(&fragment, child, Some(node_id));
        }
        Ok(())
    }

    pub(crate) fn insert_html(
        &mut self,
        node_id: NodeId,
        position: InsertPosition,
        markup: &str,
    ) -> Result<()> {
        if !self.can_have_children(node_id) {
            return Err(Error::Dom("insertAdjacentHTML target cannot have children".into()));
        }
        let fragment = html::parse_fragment(markup)?;
        let sources = fragment.nodes[fragment.root.0].children.clone();
        let mut imported = Vec::with_capacity(sources.len());
        for source in sources {
            imported.push(self.import_subtree(&fragment, source, None));
        }
        match position {
            InsertPosition::BeforeEnd => {
                for node in imported {
                    self.append_child(node_id, node)?;
                }
            }
            InsertPosition::AfterBegin => {
                let reference = self.nodes[node_id.0].children.first().copied();
                for node in imported {
                    match reference {
                        Some(reference) => self.insert_before(node_id, node, reference)?,
                        None => self.append_child(node_id, node)?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Copies `source_node` and its subtree from `source` into this tree.
    pub(crate) fn import_subtree(
        &mut self,
        source: &Dom,
        source_node: NodeId,
        parent: Option<NodeId>,
    ) -> NodeId {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let data = match &source.nodes[source_node.0].data {
                NodeData::Document | NodeData::Fragment => NodeData::Fragment,
                other => other.clone(),
            };
            let node = self.create_node(parent, data);
            for child in &source.nodes[source_node.0].children {
                self.import_subtree(source, *child, Some(node));
            }
            node
        })
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()).cloned())
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> Result<bool> {
        let element = self.require_element("hasAttribute", node_id)?;
        Ok(element.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let element = self.require_element_mut("setAttribute", node_id)?;
        let lowered = name.to_ascii_lowercase();
        element.attrs.insert(lowered.clone(), value.to_string());
        match lowered.as_str() {
            "value" => element.value = value.to_string(),
            "checked" => element.checked = true,
            "selected" => element.selected = true,
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let element = self.require_element_mut("removeAttribute", node_id)?;
        let lowered = name.to_ascii_lowercase();
        element.attrs.remove(&lowered);
        match lowered.as_str() {
            "value" => element.value.clear(),
            "checked" => element.checked = false,
            "selected" => element.selected = false,
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> Result<bool> {
        Ok(self.require_element("classList", node_id)?.has_class(class_name))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.require_element_mut("classList", node_id)?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        if !classes.iter().any(|name| name == class_name) {
            classes.push(class_name.to_string());
        }
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.require_element_mut("classList", node_id)?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        classes.retain(|name| name != class_name);
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn class_toggle(&mut self, node_id: NodeId, class_name: &str) -> Result<bool> {
        if self.class_contains(node_id, class_name)? {
            self.class_remove(node_id, class_name)?;
            Ok(false)
        } else {
            self.class_add(node_id, class_name)?;
            Ok(true)
        }
    }

    pub(crate) fn style_get(&self, node_id: NodeId, key: &str) -> Result<String> {
        let element = self.require_element("style", node_id)?;
        let name = prop_to_css_name(key);
        let decls = parse_style_declarations(element.attrs.get("style").map(String::as_str));
        Ok(decls
            .iter()
            .find(|(prop, _)| prop == &name)
            .map(|(_, value)| value.clone())
            .unwrap_or_default())
    }

    pub(crate) fn style_set(&mut self, node_id: NodeId, key: &str, value: &str) -> Result<()> {
        let name = prop_to_css_name(key);
        let element = self.require_element_mut("style", node_id)?;

        let mut decls = parse_style_declarations(element.attrs.get("style").map(String::as_str));
        if let Some(pos) = decls.iter().position(|(prop, _)| prop == &name) {
            if value.is_empty() {
                decls.remove(pos);
            } else {
                decls[pos].1 = value.to_string();
            }
        } else if !value.is_empty() {
            decls.push((name, value.to_string()));
        }

        if decls.is_empty() {
            element.attrs.remove("style");
        } else {
            element
                .attrs
                .insert("style".to_string(), serialize_style_declarations(&decls));
        }
        Ok(())
    }

    pub(crate) fn dataset_get(&self, node_id: NodeId, key: &str) -> Result<Option<String>> {
        let element = self.require_element("dataset", node_id)?;
        let name = dataset_key_to_attr_name(key);
        Ok(element.attrs.get(&name).cloned())
    }

    pub(crate) fn dataset_set(&mut self, node_id: NodeId, key: &str, value: &str) -> Result<()> {
        let name = dataset_key_to_attr_name(key);
        self.set_attr(node_id, &name, value)
    }

    pub(crate) fn dataset_entries(&self, node_id: NodeId) -> Result<BTreeMap<String, String>> {
        let element = self.require_element("dataset", node_id)?;
        let mut out = BTreeMap::new();
        for (name, value) in &element.attrs {
            if let Some(suffix) = name.strip_prefix("data-") {
                out.insert(attr_suffix_to_dataset_key(suffix)?, value.clone());
            }
        }
        Ok(out)
    }

    pub(crate) fn value(&self, node_id: NodeId) -> Result<String> {
        let element = self.require_element("value", node_id)?;
        if element.tag_name == "select" {
            return Ok(self.select_value(node_id));
        }
        Ok(element.value.clone())
    }

    pub(crate) fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.tag_name(node_id) == Some("select") {
            let options = self.select_options(node_id);
            for option in options {
                let matched = self.option_value(option) == value;
                if let Some(element) = self.element_mut(option) {
                    element.selected = matched;
                }
            }
            return Ok(());
        }
        self.require_element_mut("value", node_id)?.value = value.to_string();
        Ok(())
    }

    fn select_options(&self, select_node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![select_node];
        while let Some(node) = stack.pop() {
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
            if self.tag_name(node) == Some("option") {
                out.push(node);
            }
        }
        out
    }

    fn option_value(&self, option_node: NodeId) -> String {
        self.attr(option_node, "value")
            .unwrap_or_else(|| self.text_content(option_node))
    }

    fn select_value(&self, select_node: NodeId) -> String {
        let options = self.select_options(select_node);
        options
            .iter()
            .copied()
            .find(|option| self.element(*option).is_some_and(|e| e.selected))
            .or_else(|| options.first().copied())
            .map(|option| self.option_value(option))
            .unwrap_or_default()
    }

    pub(crate) fn checked(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.require_element("checked", node_id)?.checked)
    }

    pub(crate) fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        self.require_element_mut("checked", node_id)?.checked = checked;
        Ok(())
    }

    pub(crate) fn selected(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.require_element("selected", node_id)?.selected)
    }

    pub(crate) fn set_selected(&mut self, node_id: NodeId, selected: bool) -> Result<()> {
        self.require_element_mut("selected", node_id)?.selected = selected;
        Ok(())
    }

    pub(crate) fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id).map(Element::disabled).unwrap_or(false)
    }

    pub(crate) fn set_disabled(&mut self, node_id: NodeId, disabled: bool) -> Result<()> {
        if disabled {
            self.set_attr(node_id, "disabled", "")
        } else {
            self.remove_attr(node_id, "disabled")
        }
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertion("appendChild", parent, child)?;
        for node in self.take_insertable(child) {
            self.nodes[node.0].parent = Some(parent);
            self.nodes[parent.0].children.push(node);
        }
        Ok(())
    }

    pub(crate) fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<()> {
        self.check_insertion("insertBefore", parent, child)?;
        if !self.is_valid_node(reference) || self.parent(reference) != Some(parent) {
            return Err(Error::Dom(
                "insertBefore reference is not a direct child".into(),
            ));
        }
        if child == reference {
            return Ok(());
        }

        for node in self.take_insertable(child) {
            let index = self.nodes[parent.0]
                .children
                .iter()
                .position(|id| *id == reference)
                .ok_or_else(|| Error::Dom("insertBefore reference is missing".into()))?;
            self.nodes[node.0].parent = Some(parent);
            self.nodes[parent.0].children.insert(index, node);
        }
        Ok(())
    }

    fn check_insertion(&self, method: &str, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_node(method, parent)?;
        self.ensure_node(method, child)?;
        if !self.can_have_children(parent) {
            return Err(Error::Dom(format!("{method} target cannot have children")));
        }
        if child == self.root || child == parent {
            return Err(Error::Dom(format!("invalid {method} node")));
        }

        // Parent must not be inside child's subtree.
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(Error::Dom(format!("{method} would create a cycle")));
            }
            cursor = self.parent(node);
        }
        Ok(())
    }

    /// Detaches `child` from its current parent. Fragments hand over their
    /// children instead of being inserted themselves.
    fn take_insertable(&mut self, child: NodeId) -> Vec<NodeId> {
        if matches!(self.nodes[child.0].data, NodeData::Fragment) {
            let moved = std::mem::take(&mut self.nodes[child.0].children);
            for node in &moved {
                self.nodes[node.0].parent = None;
            }
            return moved;
        }
        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
            self.nodes[child.0].parent = None;
        }
        vec![child]
    }

    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_node("removeChild", parent)?;
        self.ensure_node("removeChild", child)?;
        if self.parent(child) != Some(parent) {
            return Err(Error::Dom(
                "removeChild target is not a direct child".into(),
            ));
        }
        self.nodes[parent.0].children.retain(|id| *id != child);
        self.nodes[child.0].parent = None;
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::Dom("cannot remove document root".into()));
        }
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        self.remove_child(parent, node)
    }

    /// Drops comment nodes and whitespace-only text nodes below `node_id`.
    pub(crate) fn remove_blank_nodes(&mut self, node_id: NodeId) -> Result<()> {
        static BLANK: OnceLock<Pattern> = OnceLock::new();
        let blank = pattern::cached(&BLANK, r"^[\r\n\t ]*$")?;
        self.remove_blank_nodes_with(node_id, blank)
    }

    fn remove_blank_nodes_with(&mut self, node_id: NodeId, blank: &Pattern) -> Result<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let children = self.nodes[node_id.0].children.clone();
            for child in children.into_iter().rev() {
                let remove = match &self.nodes[child.0].data {
                    NodeData::Comment(_) => true,
                    NodeData::Text(text) => blank.is_match(text)?,
                    NodeData::Element(_) => {
                        if !self.nodes[child.0].children.is_empty() {
                            self.remove_blank_nodes_with(child, blank)?;
                        }
                        false
                    }
                    NodeData::Document | NodeData::Fragment => false,
                };
                if remove {
                    self.remove_child(node_id, child)?;
                }
            }
            Ok(())
        })
    }

    pub(crate) fn serialize_node(&self, node_id: NodeId) -> String {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match &self.nodes[node_id.0].data {
                NodeData::Document | NodeData::Fragment => self.inner_html(node_id),
                NodeData::Text(text) => {
                    let raw_parent = self
                        .parent(node_id)
                        .and_then(|parent| self.tag_name(parent))
                        .is_some_and(|tag| matches!(tag, "script" | "style"));
                    if raw_parent {
                        text.clone()
                    } else {
                        escape_text(text)
                    }
                }
                NodeData::Comment(text) => format!("<!--{text}-->"),
                NodeData::Element(element) => {
                    let mut out = String::new();
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (k, v) in &element.attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        out.push_str(&escape_attr(v));
                        out.push('"');
                    }
                    out.push('>');
                    if html::is_void_tag(&element.tag_name) {
                        return out;
                    }
                    out.push_str(&self.inner_html(node_id));
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                    out
                }
            }
        })
    }
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

fn set_class_attr(element: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        element.attrs.remove("class");
    } else {
        element.attrs.insert("class".to_string(), classes.join(" "));
    }
}

pub(crate) fn dataset_key_to_attr_name(key: &str) -> String {
    format!("data-{}", prop_to_css_name(key))
}

fn attr_suffix_to_dataset_key(suffix: &str) -> Result<String> {
    static DASH_LOWER: OnceLock<Pattern> = OnceLock::new();
    let dash_lower = pattern::cached(&DASH_LOWER, "-[a-z]")?;
    dash_lower.replace_all(suffix, |matched| matched[1..].to_ascii_uppercase())
}

/// Dataset keys may not contain a dash followed by a lowercase letter.
pub(crate) fn is_valid_dataset_key(key: &str) -> Result<bool> {
    static DASH_LOWER: OnceLock<Pattern> = OnceLock::new();
    let dash_lower = pattern::cached(&DASH_LOWER, "-[a-z]")?;
    Ok(!key.is_empty() && !dash_lower.is_match(key)?)
}

pub(crate) fn default_display(tag: &str) -> &'static str {
    match tag {
        "a" | "abbr" | "b" | "bdo" | "cite" | "code" | "em" | "i" | "img" | "kbd" | "label"
        | "q" | "s" | "small" | "span" | "strong" | "sub" | "sup" | "u" | "var" => "inline",
        "button" | "input" | "select" | "textarea" => "inline-block",
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        _ => "block",
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
