//! Tag lists: the in-memory, desired form of a context's tags
//!
//! A [`TagList`] is what callers read and write on a taggable. It is parsed from
//! delimiter-separated text, where a name wrapped in double or single quotes may
//! contain the delimiter itself.
//!
//! # Examples
//!
//! ```
//! use taggable::domain::TagList;
//!
//! let list = TagList::parse(r#"rust, "web, backend", cli"#, ",");
//! assert_eq!(list.names(), &["rust", "web, backend", "cli"]);
//! assert_eq!(list.to_string(), r#"rust, "web, backend", cli"#);
//! ```

use super::tag::NamePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Ordered list of distinct, non-blank tag names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    names: Vec<String>,
}

impl TagList {
    pub fn new() -> Self {
        TagList::default()
    }

    /// Parse delimiter-separated text, honoring quoted names
    pub fn parse(input: &str, delimiter: &str) -> Self {
        let mut list = TagList::new();
        for name in split_names(input, delimiter) {
            list.add(name);
        }
        list
    }

    /// Append a name, trimming whitespace; blanks and exact duplicates are ignored
    pub fn add(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref().trim();
        if name.is_empty() || self.names.iter().any(|existing| existing == name) {
            return;
        }
        self.names.push(name.to_string());
    }

    /// Remove every name equal to `name` under the given policy
    pub fn remove(&mut self, name: &str, policy: NamePolicy) {
        self.names.retain(|existing| !policy.same(existing, name));
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    /// Names with policy-equal duplicates collapsed; the first spelling wins
    pub fn deduped(&self, policy: NamePolicy) -> Vec<String> {
        let mut seen = HashSet::new();
        self.names
            .iter()
            .filter(|name| seen.insert(policy.comparable(name)))
            .cloned()
            .collect()
    }

    /// Render with a specific delimiter, quoting names that contain it
    pub fn to_string_with(&self, delimiter: &str) -> String {
        let glue = if delimiter.ends_with(' ') {
            delimiter.to_string()
        } else {
            format!("{} ", delimiter)
        };

        self.names
            .iter()
            .map(|name| {
                if !delimiter.is_empty() && name.contains(delimiter.trim()) {
                    format!("\"{}\"", name)
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(&glue)
    }
}

impl fmt::Display for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(","))
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = TagList::new();
        for name in iter {
            list.add(name);
        }
        list
    }
}

impl From<Vec<String>> for TagList {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<&[&str]> for TagList {
    fn from(names: &[&str]) -> Self {
        names.iter().collect()
    }
}

/// A tag list assignment, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagListChange {
    pub previous: TagList,
    pub next: TagList,
}

impl TagListChange {
    pub fn is_changed(&self) -> bool {
        self.previous != self.next
    }
}

fn split_names<'a>(input: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return vec![input];
    }

    let mut names = Vec::new();
    let mut rest = input;

    loop {
        let token = rest.trim_start();

        if let Some(quoted) = quoted_name(token, delimiter) {
            names.push(quoted.name);
            match quoted.rest {
                Some(next) => {
                    rest = next;
                    continue;
                }
                None => break,
            }
        }

        match token.find(delimiter) {
            Some(index) => {
                names.push(&token[..index]);
                rest = &token[index + delimiter.len()..];
            }
            None => {
                names.push(token);
                break;
            }
        }
    }

    names
}

struct QuotedName<'a> {
    name: &'a str,
    /// Text after the following delimiter, `None` at end of input
    rest: Option<&'a str>,
}

/// A name fully enclosed in quotes and followed by a delimiter or end of input
fn quoted_name<'a>(token: &'a str, delimiter: &str) -> Option<QuotedName<'a>> {
    let quote = token.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &token[1..];
    let end = body.find(quote)?;
    let after = body[end + 1..].trim_start();

    if after.is_empty() {
        return Some(QuotedName {
            name: &body[..end],
            rest: None,
        });
    }

    after.strip_prefix(delimiter).map(|next| QuotedName {
        name: &body[..end],
        rest: Some(next),
    })
}
