use crate::css::{CssRule, StyleSheetId};
use crate::document::Document;
use crate::dom::{NodeId, NodeKind};
use crate::runtime_state::{NativeListener, ReadyState};
use crate::wrapper::{AsNode, ElementWrapper};
use crate::{Error, Result};

/// Selection and creation entry point bound to one [`Document`].
///
/// Rules added through [`SimpleQuery::add_css_rule`] go to a style sheet this
/// value creates on first use and keeps for its lifetime.
#[derive(Debug, Clone)]
pub struct SimpleQuery {
    document: Document,
    style_sheet: Option<StyleSheetId>,
}

impl SimpleQuery {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            style_sheet: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn select(&self, selector: &str) -> Result<Option<ElementWrapper>> {
        self.document
            .query_selector(selector)?
            .map(|node| self.wrap(node))
            .transpose()
    }

    /// Like [`SimpleQuery::select`], searching only below `context`.
    pub fn select_in(&self, selector: &str, context: impl AsNode) -> Result<Option<ElementWrapper>> {
        self.document
            .query_selector_in(context.as_node(), selector)?
            .map(|node| self.wrap(node))
            .transpose()
    }

    pub fn all(&self, selector: &str) -> Result<Vec<ElementWrapper>> {
        self.document
            .query_selector_all(selector)?
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    pub fn all_in(&self, selector: &str, context: impl AsNode) -> Result<Vec<ElementWrapper>> {
        self.document
            .query_selector_all_in(context.as_node(), selector)?
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    pub fn wrap(&self, node: NodeId) -> Result<ElementWrapper> {
        ElementWrapper::new(self.document.clone(), node)
    }

    /// A new detached element.
    pub fn create(&self, tag_name: &str) -> Result<ElementWrapper> {
        let node = self.document.create_element(tag_name)?;
        self.wrap(node)
    }

    pub fn create_fragment(&self) -> Result<ElementWrapper> {
        let node = self.document.create_fragment();
        self.wrap(node)
    }

    /// Parses `html` and wraps its first top-level element, detached.
    pub fn from_html(&self, html: &str) -> Result<ElementWrapper> {
        let fragment = self.document.parse_fragment(html)?;
        let first = self
            .document
            .child_nodes(fragment)
            .into_iter()
            .find(|node| self.document.node_kind(*node) == Some(NodeKind::Element))
            .ok_or_else(|| Error::HtmlParse(format!("no element in {html:?}")))?;
        self.document.remove_child(fragment, first)?;
        self.wrap(first)
    }

    /// Detaches `element` from its parent, if any, and hands it back.
    pub fn remove(&self, element: ElementWrapper) -> Result<ElementWrapper> {
        self.document.remove(element.node())?;
        Ok(element)
    }

    /// Appends a stylesheet `<link>` for `path` to `<head>`.
    pub fn add_css_file(&self, path: &str) -> Result<ElementWrapper> {
        if path.trim().is_empty() {
            return Err(Error::invalid("addCSSFile", "path must not be empty"));
        }
        let mut link = self.create("link")?;
        link.set_attrib("href", path)?
            .set_attrib("rel", "stylesheet")?
            .set_attrib("type", "text/css")?;
        self.document.append_child(self.document.head(), link.node())?;
        Ok(link)
    }

    /// Appends `rule` to the owned style sheet and returns its index.
    pub fn add_css_rule(&mut self, rule: &str) -> Result<usize> {
        let sheet = match self.style_sheet {
            Some(sheet) => sheet,
            None => {
                let sheet = self.document.create_style_sheet()?;
                self.style_sheet = Some(sheet);
                sheet
            }
        };
        let len = self.document.css_rules(sheet)?.len();
        self.document.insert_rule(sheet, rule, len)
    }

    /// Deletes every owned rule whose selector text is `selector`.
    pub fn remove_css_rules(&mut self, selector: &str) -> Result<usize> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Error::invalid("removeCSSRule", "selector must not be empty"));
        }
        let Some(sheet) = self.style_sheet else {
            return Ok(0);
        };

        let rules = self.document.css_rules(sheet)?;
        let mut removed = 0;
        for (index, rule) in rules.iter().enumerate().rev() {
            if rule.selector_text() == selector {
                self.document.delete_rule(sheet, index)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn css_rules(&self) -> Result<Vec<CssRule>> {
        match self.style_sheet {
            Some(sheet) => self.document.css_rules(sheet),
            None => Ok(Vec::new()),
        }
    }

    pub fn style_sheet(&self) -> Option<StyleSheetId> {
        self.style_sheet
    }

    /// Runs `callback` once the document is interactive; immediately when it
    /// already is.
    pub fn on_dom_ready(&self, callback: impl Fn(&Document) -> Result<()> + 'static) -> Result<()> {
        self.when_ready(ReadyState::Interactive, "DOMContentLoaded", callback)
    }

    /// Runs `callback` once the document has fully loaded.
    pub fn on_load(&self, callback: impl Fn(&Document) -> Result<()> + 'static) -> Result<()> {
        self.when_ready(ReadyState::Complete, "load", callback)
    }

    fn when_ready(
        &self,
        state: ReadyState,
        event_type: &str,
        callback: impl Fn(&Document) -> Result<()> + 'static,
    ) -> Result<()> {
        if self.document.ready_state() >= state {
            return callback(&self.document);
        }
        let listener = NativeListener::new(move |document, _event| callback(document));
        self.document
            .add_event_listener_once(self.document.document_node(), event_type, &listener)?;
        Ok(())
    }
}
