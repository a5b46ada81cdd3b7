// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Numeric range expansion for host entries
//!
//! Supported forms inside brackets:
//! - `node[1-3]` -> `node1, node2, node3`
//! - `node[01-03]` -> `node01, node02, node03` (zero padding follows the start value)
//! - `node[1,3,5-6]` -> `node1, node3, node5, node6`
//! - `rack[1-2]-node[1-2]` -> cartesian product, 4 hosts
//!
//! Brackets that contain a `:` are IPv6 literals (`[fe80::1]:22`) and are kept as-is.

use super::error::ResolveError;

/// Maximum number of hosts a single entry may expand to
pub const MAX_EXPANSION: usize = 65_536;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Range(RangeExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RangeExpr {
    /// Inclusive `(start, end)` pairs in written order
    items: Vec<(u64, u64)>,
    /// Zero-padding width, 0 when no padding was requested
    width: usize,
}

impl RangeExpr {
    fn count(&self) -> usize {
        self.items.iter().fold(0usize, |acc, (start, end)| {
            let span = usize::try_from((end - start).saturating_add(1)).unwrap_or(usize::MAX);
            acc.saturating_add(span)
        })
    }

    fn values(&self) -> impl Iterator<Item = String> + '_ {
        self.items.iter().flat_map(move |&(start, end)| {
            (start..=end).map(move |v| format!("{v:0width$}", width = self.width))
        })
    }
}

/// Split a host specification on commas that are not inside brackets.
///
/// Unlike a plain `split(',')`, empty entries are reported instead of skipped
/// so that a stray comma in an operator's host list is caught before dispatch.
pub fn split_entries(spec: &str) -> Result<Vec<String>, ResolveError> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    let push = |entry: &mut String, entries: &mut Vec<String>| {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyEntry {
                spec: spec.to_string(),
                position: entries.len() + 1,
            });
        }
        entries.push(trimmed.to_string());
        entry.clear();
        Ok(())
    };

    for ch in spec.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                if depth == 0 {
                    return Err(ResolveError::UnmatchedBracket {
                        expression: spec.to_string(),
                    });
                }
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => push(&mut current, &mut entries)?,
            _ => current.push(ch),
        }
    }

    if depth != 0 {
        return Err(ResolveError::UnclosedBracket {
            expression: spec.to_string(),
        });
    }
    push(&mut current, &mut entries)?;

    Ok(entries)
}

/// Expand the numeric ranges of a single entry.
///
/// An entry without ranges expands to itself.
pub fn expand_entry(entry: &str) -> Result<Vec<String>, ResolveError> {
    let segments = parse_segments(entry)?;

    let count = segments.iter().try_fold(1usize, |acc, segment| match segment {
        Segment::Literal(_) => Some(acc),
        Segment::Range(range) => acc.checked_mul(range.count()),
    });
    match count {
        Some(count) if count <= MAX_EXPANSION => {}
        other => {
            return Err(ResolveError::RangeTooLarge {
                expression: entry.to_string(),
                count: other.unwrap_or(usize::MAX),
                limit: MAX_EXPANSION,
            })
        }
    }

    let mut results = vec![String::new()];
    for segment in &segments {
        match segment {
            Segment::Literal(lit) => {
                for result in &mut results {
                    result.push_str(lit);
                }
            }
            Segment::Range(range) => {
                let mut expanded = Vec::with_capacity(results.len() * range.count());
                for prefix in &results {
                    for value in range.values() {
                        expanded.push(format!("{prefix}{value}"));
                    }
                }
                results = expanded;
            }
        }
    }

    Ok(results)
}

fn parse_segments(entry: &str) -> Result<Vec<Segment>, ResolveError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = entry;

    while let Some(open) = rest.find('[') {
        let close = rest[open..]
            .find(']')
            .map(|offset| open + offset)
            .ok_or_else(|| ResolveError::UnclosedBracket {
                expression: entry.to_string(),
            })?;
        let content = &rest[open + 1..close];

        literal.push_str(&rest[..open]);
        if content.contains(':') {
            // IPv6 literal, not a range
            literal.push_str(&rest[open..=close]);
        } else {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Range(parse_range(entry, content)?));
        }
        rest = &rest[close + 1..];
    }

    if rest.contains(']') {
        return Err(ResolveError::UnmatchedBracket {
            expression: entry.to_string(),
        });
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn parse_range(entry: &str, content: &str) -> Result<RangeExpr, ResolveError> {
    let invalid = || ResolveError::InvalidRange {
        expression: entry.to_string(),
        range: content.to_string(),
    };
    let parse_number = |s: &str| -> Result<u64, ResolveError> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse::<u64>().map_err(|_| invalid())
    };

    if content.trim().is_empty() {
        return Err(invalid());
    }

    let mut items = Vec::new();
    let mut width = 0;
    for part in content.split(',') {
        let part = part.trim();
        let (start_str, end_str) = match part.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (part, part),
        };
        let start = parse_number(start_str)?;
        let end = parse_number(end_str)?;
        if start > end {
            return Err(ResolveError::ReversedRange {
                expression: entry.to_string(),
                start,
                end,
            });
        }
        if start_str.len() > 1 && start_str.starts_with('0') {
            width = width.max(start_str.len());
        }
        items.push((start, end));
    }

    Ok(RangeExpr { items, width })
}
