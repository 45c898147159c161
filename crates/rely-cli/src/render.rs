//! Terminal rendering of reports and closures.

use std::collections::{BTreeMap, HashSet};

use chrono::SecondsFormat;
use colored::{ColoredString, Colorize};
use rely_core::{Category, NodeReport, Timestamp};

const LABEL_WIDTH: usize = 14;

/// Colour `text` the way `category` is shown everywhere.
pub fn paint(text: &str, category: Category) -> ColoredString {
    match category {
        Category::SafeClean => text.blue(),
        Category::SafeModified => text.cyan(),
        Category::Stale => text.red().bold(),
        Category::Modified => text.yellow(),
        Category::Clean => text.green(),
    }
}

fn when(at: &Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One line per report. Young ancestors (`<-`) and old descendants (`->`)
/// are listed under the file they concern.
pub fn status(reports: &[NodeReport], verbose: bool) -> String {
    let mut out = String::new();
    for report in reports {
        let label = format!("{:<width$}", report.category.label(), width = LABEL_WIDTH);
        out.push_str(&format!("{} {}", paint(&label, report.category), report.path));
        if verbose {
            out.push_str(&format!("  ({})", when(&report.last_modified)).dimmed().to_string());
        }
        out.push('\n');

        let related = report
            .young_ancestors
            .iter()
            .map(|r| ("<-", r))
            .chain(report.old_descendants.iter().map(|r| ("->", r)));
        for (marker, other) in related {
            out.push_str(&format!(
                "{:width$}   {} {} ({})\n",
                "",
                marker,
                other.path,
                when(&other.last_modified),
                width = LABEL_WIDTH
            ));
        }
    }
    out
}

/// Per-category totals, e.g. `2 stale, 5 clean`.
pub fn summary(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "nothing tracked".to_string();
    }
    counts
        .iter()
        .map(|(label, n)| format!("{} {}", n, label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Indented ASCII tree of a closure. A node reached a second time is marked
/// with `(*)` and not expanded again.
pub fn tree(
    root: &str,
    adjacency: &BTreeMap<String, Vec<String>>,
    categories: &BTreeMap<String, Category>,
) -> String {
    let mut out = String::new();
    let mut seen: HashSet<&str> = HashSet::new();
    // (path, indent for its children, connector drawn before it)
    let mut stack: Vec<(&str, String, String)> = vec![(root, String::new(), String::new())];

    while let Some((path, indent, connector)) = stack.pop() {
        let first = seen.insert(path);
        out.push_str(&connector);
        match categories.get(path) {
            Some(&category) => out.push_str(&paint(path, category).to_string()),
            None => out.push_str(path),
        }
        if !first {
            out.push_str(" (*)\n");
            continue;
        }
        out.push('\n');

        let kids = adjacency.get(path).map(Vec::as_slice).unwrap_or_default();
        for (i, kid) in kids.iter().enumerate().rev() {
            let last = i + 1 == kids.len();
            stack.push((
                kid.as_str(),
                format!("{}{}", indent, if last { "    " } else { "│   " }),
                format!("{}{}", indent, if last { "└── " } else { "├── " }),
            ));
        }
    }
    out
}
