//! Rewriting of query templates into driver-ready SQL.
//!
//! A template is SQL with positional markers:
//!
//! | Marker | Meaning |
//! |---|---|
//! | `?` | bind the next value |
//! | `??` | bind the next IN group, expanded to `?,?,...,?` |
//! | `#` or `'#'` | skip: drop the marker, its leading comma and the next value |
//! | `#text` or `'#text'` | emit `text` verbatim, binding nothing |
//!
//! A marker may be preceded by a comma. That comma is kept unless the marker
//! is the first one to emit anything, so `(#, ?, ?)` becomes `(?, ?)`.
//! Text inside single or double quotes is copied verbatim and never scanned.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RdaxError, Result};
use crate::types::SqlValue;

static MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<marker>(?P<comma>,\s*)?(?:'#[A-Za-z0-9_\-.:( ]*'|#[A-Za-z0-9_\-.:( ]*|\?\?|\?))|'(?:[^']|'')*'|"(?:[^"]|"")*""#,
    )
    .unwrap()
});

/// Final SQL and the values to bind to it, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInputs {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

enum Marker<'a> {
    Param,
    Expand,
    Skip,
    Literal(&'a str),
}

fn classify(body: &str) -> Marker<'_> {
    match body {
        "?" => Marker::Param,
        "??" => Marker::Expand,
        quoted_or_bare => {
            let inner = quoted_or_bare
                .strip_prefix('\'')
                .and_then(|b| b.strip_suffix('\''))
                .unwrap_or(quoted_or_bare);
            let text = inner.strip_prefix('#').unwrap_or(inner).trim();
            if text.is_empty() {
                Marker::Skip
            } else {
                Marker::Literal(text)
            }
        }
    }
}

fn push_separator(sql: &mut String, comma: Option<&str>, first: bool) {
    if let Some(comma) = comma {
        if !first {
            sql.push_str(comma);
        }
    }
}

/// Rewrites `template`, consuming `values` for `?` and `#` markers and
/// `groups` for `??` markers, in order.
///
/// Every value and every group must be consumed. Running out of either, an
/// empty IN group, or an empty template is a [`RdaxError::Template`].
pub fn rewrite(
    template: &str,
    values: Vec<SqlValue>,
    groups: Vec<Vec<SqlValue>>,
) -> Result<QueryInputs> {
    if template.trim().is_empty() {
        return Err(RdaxError::template("query template is empty"));
    }

    let supplied = values.len();
    let mut values = values.into_iter();
    let mut groups = groups.into_iter();
    let mut sql = String::with_capacity(template.len() + 16);
    let mut bound = Vec::with_capacity(supplied);
    let mut last = 0;
    let mut first = true;

    for caps in MARKERS.captures_iter(template) {
        // quoted text stays in the pending segment
        let Some(marker) = caps.name("marker") else {
            continue;
        };
        sql.push_str(&template[last..marker.start()]);
        last = marker.end();

        let comma = caps.name("comma");
        let body_start = comma.map_or(marker.start(), |c| c.end());
        let comma = comma.map(|c| c.as_str());

        match classify(&template[body_start..marker.end()]) {
            Marker::Skip => {
                values.next();
            }
            Marker::Literal(text) => {
                push_separator(&mut sql, comma, first);
                sql.push_str(text);
                first = false;
            }
            Marker::Expand => {
                let group = groups
                    .next()
                    .ok_or_else(|| RdaxError::template("no IN group left for '??' marker"))?;
                if group.is_empty() {
                    return Err(RdaxError::template("IN group is empty"));
                }
                push_separator(&mut sql, comma, first);
                sql.push_str(&vec!["?"; group.len()].join(","));
                bound.extend(group);
                first = false;
            }
            Marker::Param => {
                let value = values.next().ok_or_else(|| {
                    RdaxError::template(format!(
                        "insufficient values for query params, {} supplied",
                        supplied
                    ))
                })?;
                push_separator(&mut sql, comma, first);
                sql.push('?');
                bound.push(value);
                first = false;
            }
        }
    }
    sql.push_str(&template[last..]);

    let unused = values.len();
    if unused > 0 {
        return Err(RdaxError::template(format!(
            "{} of {} values not consumed by any marker",
            unused, supplied
        )));
    }
    let unused = groups.len();
    if unused > 0 {
        return Err(RdaxError::template(format!(
            "{} IN group(s) not consumed by any '??' marker",
            unused
        )));
    }

    Ok(QueryInputs { sql, values: bound })
}
