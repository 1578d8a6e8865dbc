//! Output formatting utilities

use crate::domain::{Tag, TagCount, TagList};

/// Format a tag list the way it is typed on the command line
pub fn format_tag_list(list: &TagList, delimiter: &str) -> String {
    if list.is_empty() {
        return "(no tags)".to_string();
    }
    list.to_string_with(delimiter)
}

/// Format tags for display, one per line
pub fn format_tags(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "No tags found".to_string();
    }

    let mut output = String::new();
    for tag in tags {
        output.push_str(&format!("{}\n", tag.name));
    }
    output
}

/// Format tag counts as right-aligned counts followed by the name
pub fn format_tag_counts(counts: &[TagCount]) -> String {
    if counts.is_empty() {
        return "No tags found".to_string();
    }

    let width = counts
        .iter()
        .map(|c| c.count.to_string().len())
        .max()
        .unwrap_or(1);

    let mut output = String::new();
    for entry in counts {
        output.push_str(&format!("{:>width$}  {}\n", entry.count, entry.tag.name, width = width));
    }
    output
}

/// Format taggable ids, one per line
pub fn format_ids(ids: &[i64]) -> String {
    if ids.is_empty() {
        return "No matches".to_string();
    }

    let mut output = String::new();
    for id in ids {
        output.push_str(&format!("{}\n", id));
    }
    output
}
