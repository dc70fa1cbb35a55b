//! Selection-rule DSL parsing and page-set resolution.
//!
//! A rule string picks pages either directly (`pages:1-3,7`, a bare page
//! number) or through sections (`sections:200,100`, a bare comma list of
//! IDs). The empty rule and `all` select every page. User-supplied ordering
//! is a contract: ranges and section IDs resolve in the order given, without
//! sorting or deduplication of the rule itself.

use std::collections::HashMap;

use crate::error::{Result, RptError};
use crate::parser::{PageTableEntry, SectionEntry};

/// A parsed selection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRule {
    /// Every page in table order.
    All,
    /// Inclusive 1-based page ranges, in user order, duplicates allowed.
    Pages(Vec<(i32, i32)>),
    /// Section IDs, in user order, duplicates allowed.
    Sections(Vec<u32>),
}

impl SelectionRule {
    /// Parse a rule string.
    ///
    /// ASCII whitespace is insignificant everywhere, so `" Pages : 1 - 3 "`
    /// and `"pages:1-3"` parse identically. Prefixes are matched
    /// case-insensitively.
    pub fn parse(rule: &str) -> Result<SelectionRule> {
        let compact: String = rule.chars().filter(|c| !c.is_whitespace()).collect();

        if compact.is_empty() || compact.eq_ignore_ascii_case("all") {
            return Ok(SelectionRule::All);
        }

        if let Some((prefix, rest)) = compact.split_once(':') {
            return match prefix.to_ascii_lowercase().as_str() {
                "pages" => Ok(SelectionRule::Pages(parse_ranges(rest)?)),
                "section" | "sections" => Ok(SelectionRule::Sections(parse_ids(rest)?)),
                other => Err(RptError::InvalidSelectionRule(format!(
                    "unknown selection type '{other}'"
                ))),
            };
        }

        // A bare comma list is a section-ID list; a bare integer is a
        // single-page selection.
        if compact.contains(',') {
            if compact.chars().all(|c| c.is_ascii_digit() || c == ',') {
                return Ok(SelectionRule::Sections(parse_ids(&compact)?));
            }
            return Err(RptError::InvalidSelectionRule(format!(
                "malformed section list '{rule}'"
            )));
        }
        if compact.chars().all(|c| c.is_ascii_digit()) {
            let n: i32 = compact.parse().map_err(|_| {
                RptError::InvalidSelectionRule(format!("page number out of range '{compact}'"))
            })?;
            return Ok(SelectionRule::Pages(vec![(n, n)]));
        }

        Err(RptError::InvalidSelectionRule(format!(
            "unrecognized rule '{rule}'"
        )))
    }

    /// Resolve the rule against the page and section tables.
    ///
    /// `Pages` emits page-table order with no duplicates even when ranges
    /// overlap. `Sections` walks IDs in user order, so duplicate or
    /// overlapping sections emit pages more than once; unknown IDs are
    /// skipped silently.
    pub fn resolve(
        &self,
        pages: &[PageTableEntry],
        sections: &[SectionEntry],
    ) -> Vec<PageTableEntry> {
        match self {
            SelectionRule::All => pages.to_vec(),
            SelectionRule::Pages(ranges) => pages
                .iter()
                .filter(|p| {
                    ranges
                        .iter()
                        .any(|&(start, end)| p.page_number >= start && p.page_number <= end)
                })
                .copied()
                .collect(),
            SelectionRule::Sections(ids) => {
                let mut by_id: HashMap<u32, &SectionEntry> = HashMap::new();
                for section in sections {
                    by_id.entry(section.section_id).or_insert(section);
                }
                let mut out = Vec::new();
                for id in ids {
                    let Some(section) = by_id.get(id) else {
                        continue;
                    };
                    out.extend(
                        pages
                            .iter()
                            .filter(|p| {
                                let number = p.page_number as u32;
                                number >= section.start_page && number <= section.end_page()
                            })
                            .copied(),
                    );
                }
                out
            }
        }
    }
}

fn parse_ranges(list: &str) -> Result<Vec<(i32, i32)>> {
    let mut ranges = Vec::new();
    for part in list.split(',') {
        if let Some((lo, hi)) = part.split_once('-') {
            let start = parse_page_number(lo, part)?;
            let end = parse_page_number(hi, part)?;
            ranges.push((start, end));
        } else {
            let n = parse_page_number(part, part)?;
            ranges.push((n, n));
        }
    }
    Ok(ranges)
}

fn parse_page_number(token: &str, context: &str) -> Result<i32> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(RptError::InvalidSelectionRule(format!(
            "Invalid page range '{context}'"
        )));
    }
    token.parse().map_err(|_| {
        RptError::InvalidSelectionRule(format!("Invalid page range '{context}'"))
    })
}

fn parse_ids(list: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for part in list.split(',') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(RptError::InvalidSelectionRule(format!(
                "invalid section id '{part}'"
            )));
        }
        ids.push(part.parse().map_err(|_| {
            RptError::InvalidSelectionRule(format!("section id out of range '{part}'"))
        })?);
    }
    Ok(ids)
}
