use std::sync::OnceLock;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    backend: fancy_regex::Regex,
}

impl Pattern {
    pub(crate) fn new(source: &str) -> Result<Self> {
        let backend = fancy_regex::Regex::new(source).map_err(Error::from)?;
        Ok(Self { backend })
    }

    pub(crate) fn is_match(&self, input: &str) -> Result<bool> {
        self.backend.is_match(input).map_err(Error::from)
    }

    pub(crate) fn captures(&self, input: &str) -> Result<Option<Captures>> {
        let captures = self.backend.captures(input).map_err(Error::from)?;
        Ok(captures.as_ref().map(Captures::from_backend))
    }

    pub(crate) fn find_all(&self, input: &str) -> Result<Vec<Match>> {
        let mut out = Vec::new();
        for matched in self.backend.find_iter(input) {
            let matched = matched.map_err(Error::from)?;
            out.push(Match::from_backend(matched));
        }
        Ok(out)
    }

    /// Replaces every match with the output of `replace`, which receives the
    /// matched text.
    pub(crate) fn replace_all(&self, input: &str, replace: impl Fn(&str) -> String) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0usize;
        for matched in self.find_all(input)? {
            out.push_str(&input[last..matched.start]);
            out.push_str(&replace(matched.as_str()));
            last = matched.end;
        }
        out.push_str(&input[last..]);
        Ok(out)
    }
}

/// Compiles `source` once per `cell` and hands back the shared pattern.
pub(crate) fn cached(cell: &'static OnceLock<Pattern>, source: &str) -> Result<&'static Pattern> {
    if let Some(pattern) = cell.get() {
        return Ok(pattern);
    }
    let compiled = Pattern::new(source)?;
    Ok(cell.get_or_init(|| compiled))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Captures {
    groups: Vec<Option<Match>>,
}

impl Captures {
    fn from_backend(captures: &fancy_regex::Captures<'_>) -> Self {
        let mut groups = Vec::with_capacity(captures.len());
        for idx in 0..captures.len() {
            groups.push(captures.get(idx).map(Match::from_backend));
        }
        Self { groups }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Match> {
        self.groups.get(index).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Match {
    start: usize,
    end: usize,
    text: String,
}

impl Match {
    fn from_backend(matched: fancy_regex::Match<'_>) -> Self {
        Self {
            start: matched.start(),
            end: matched.end(),
            text: matched.as_str().to_string(),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        self.text.as_str()
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(value: fancy_regex::Error) -> Self {
        Error::Pattern(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_all_rewrites_each_match_in_order() -> Result<()> {
        let pattern = Pattern::new("-[a-z]")?;
        let out = pattern.replace_all("data-my-key", |m| m[1..].to_ascii_uppercase())?;
        assert_eq!(out, "dataMyKey");
        Ok(())
    }

    #[test]
    fn invalid_source_maps_to_pattern_error() {
        assert!(matches!(Pattern::new("(unclosed"), Err(Error::Pattern(_))));
    }
}
