use std::fmt;
use std::sync::OnceLock;

use crate::dom::NodeId;
use crate::pattern::{self, Pattern};
use crate::{Error, Result};

/// Handle to a style sheet created through [`Document::create_style_sheet`].
///
/// [`Document::create_style_sheet`]: crate::Document::create_style_sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleSheetId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    selector_text: String,
    declarations: Vec<(String, String)>,
}

impl CssRule {
    /// Parses a single `selector { declarations }` rule.
    pub fn parse(text: &str) -> Result<Self> {
        static RULE: OnceLock<Pattern> = OnceLock::new();
        let rule = pattern::cached(&RULE, r"^\s*([^{}\s][^{}]*?)\s*\{([^{}]*)\}\s*$")?;
        let captures = rule
            .captures(text)?
            .ok_or_else(|| Error::CssParse(format!("malformed rule: {text:?}")))?;
        let selector_text = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::CssParse(format!("missing selector in {text:?}")))?;
        let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

        Ok(Self {
            selector_text,
            declarations: parse_style_declarations(Some(body)),
        })
    }

    pub fn selector_text(&self) -> &str {
        &self.selector_text
    }

    /// Value of one declaration; camelCase and kebab-case names are accepted.
    pub fn style(&self, name: &str) -> Option<&str> {
        let name = prop_to_css_name(name);
        self.declarations
            .iter()
            .find(|(prop, _)| *prop == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn css_text(&self) -> String {
        if self.declarations.is_empty() {
            return format!("{} {{ }}", self.selector_text);
        }
        format!(
            "{} {{ {} }}",
            self.selector_text,
            serialize_style_declarations(&self.declarations)
        )
    }
}

impl fmt::Display for CssRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css_text())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StyleSheet {
    pub(crate) owner: NodeId,
    pub(crate) rules: Vec<CssRule>,
}

impl StyleSheet {
    pub(crate) fn new(owner: NodeId) -> Self {
        Self {
            owner,
            rules: Vec::new(),
        }
    }

    pub(crate) fn insert_rule(&mut self, text: &str, index: usize) -> Result<usize> {
        if index > self.rules.len() {
            return Err(Error::out_of_range("insertRule", index, self.rules.len()));
        }
        let rule = CssRule::parse(text)?;
        self.rules.insert(index, rule);
        Ok(index)
    }

    pub(crate) fn delete_rule(&mut self, index: usize) -> Result<()> {
        if index >= self.rules.len() {
            return Err(Error::out_of_range("deleteRule", index, self.rules.len()));
        }
        self.rules.remove(index);
        Ok(())
    }
}

/// `backgroundColor` becomes `background-color`; kebab-case passes through.
pub(crate) fn prop_to_css_name(prop: &str) -> String {
    let mut out = String::with_capacity(prop.len());
    for ch in prop.trim().chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub(crate) fn parse_style_declarations(style_attr: Option<&str>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Some(style_attr) = style_attr else {
        return out;
    };

    let bytes = style_attr.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let ch = bytes[i];
        match (quote, ch) {
            (Some(_), b'\\') => {
                i += 2;
                continue;
            }
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, b'\'' | b'"') => quote = Some(ch),
            (None, b'(') => paren_depth += 1,
            (None, b')') => paren_depth = paren_depth.saturating_sub(1),
            (None, b';') if paren_depth == 0 => {
                push_style_declaration(&style_attr[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < style_attr.len() {
        push_style_declaration(&style_attr[start..], &mut out);
    }

    out
}

fn push_style_declaration(raw_decl: &str, out: &mut Vec<(String, String)>) {
    let Some((name, value)) = raw_decl.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return;
    }
    let value = value.trim().to_string();

    if let Some(pos) = out.iter().position(|(existing, _)| *existing == name) {
        out[pos].1 = value;
    } else {
        out.push((name, value));
    }
}

pub(crate) fn serialize_style_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_parse_splits_selector_and_declarations() -> Result<()> {
        let rule = CssRule::parse("  .nav > li { color: red; background-color: blue }")?;
        assert_eq!(rule.selector_text(), ".nav > li");
        assert_eq!(rule.style("color"), Some("red"));
        assert_eq!(rule.style("backgroundColor"), Some("blue"));
        assert_eq!(rule.css_text(), ".nav > li { color: red; background-color: blue; }");
        Ok(())
    }

    #[test]
    fn rule_without_braces_is_rejected() {
        assert!(matches!(CssRule::parse("p color: red"), Err(Error::CssParse(_))));
        assert!(matches!(CssRule::parse("{ color: red }"), Err(Error::CssParse(_))));
    }

    #[test]
    fn declarations_respect_quotes_and_parens() {
        let decls = parse_style_declarations(Some(
            "background: url('a;b.png'); content: \"x:y\"; color:red",
        ));
        assert_eq!(
            decls,
            vec![
                ("background".to_string(), "url('a;b.png')".to_string()),
                ("content".to_string(), "\"x:y\"".to_string()),
                ("color".to_string(), "red".to_string()),
            ]
        );
        assert_eq!(serialize_style_declarations(&decls[2..]), "color: red;");
    }

    #[test]
    fn sheet_rejects_out_of_range_indices() -> Result<()> {
        let mut sheet = StyleSheet::new(NodeId(1));
        sheet.insert_rule("a { color: red }", 0)?;
        assert!(matches!(
            sheet.insert_rule("b { color: red }", 5),
            Err(Error::OutOfRange { index: 5, len: 1, .. })
        ));
        assert!(matches!(sheet.delete_rule(1), Err(Error::OutOfRange { .. })));
        sheet.delete_rule(0)?;
        assert!(sheet.rules.is_empty());
        Ok(())
    }
}
