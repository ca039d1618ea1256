// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-range syntax shared by the split, extract, and rotate tools.
//
// User input is 1-based ("1,3,5-7"); everything returned here is 0-based page
// indices. A trailing open range ("5-") runs to the last page.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use filewerk_core::error::{FilewerkError, Result};

/// Parse a selection into sorted, de-duplicated 0-based page indices.
///
/// `"1,3,5-7"` against a 10-page document yields `[0, 2, 4, 5, 6]`.
pub fn parse_page_selection(input: &str, page_count: u32) -> Result<Vec<u32>> {
    let mut pages = BTreeSet::new();
    for range in parse_ranges(input, page_count)? {
        pages.extend(range.map(|page| page - 1));
    }
    Ok(pages.into_iter().collect())
}

/// Parse a selection keeping each comma-separated group separate, in input
/// order. `"1-3,5"` yields `[[0, 1, 2], [4]]`.
pub fn parse_page_groups(input: &str, page_count: u32) -> Result<Vec<Vec<u32>>> {
    Ok(parse_ranges(input, page_count)?
        .into_iter()
        .map(|range| range.map(|page| page - 1).collect())
        .collect())
}

/// Check the syntax of a selection before the page count is known.
///
/// Catches empty input, page 0, backwards ranges, and stray text; the upper
/// bound is only checked once the document is open.
pub fn check_page_syntax(input: &str) -> Result<()> {
    parse_ranges(input, u32::MAX).map(|_| ())
}

/// Parse into validated 1-based inclusive ranges.
fn parse_ranges(input: &str, page_count: u32) -> Result<Vec<RangeInclusive<u32>>> {
    let ranges: Vec<RangeInclusive<u32>> = input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_token(token, page_count))
        .collect::<Result<_>>()?;

    if ranges.is_empty() {
        return Err(FilewerkError::Validation("no pages selected".into()));
    }
    Ok(ranges)
}

fn parse_token(token: &str, page_count: u32) -> Result<RangeInclusive<u32>> {
    let (start, end) = match token.split_once('-') {
        Some((start, end)) => {
            let start = parse_page_number(start.trim(), token)?;
            let end = if end.trim().is_empty() {
                page_count
            } else {
                parse_page_number(end.trim(), token)?
            };
            (start, end)
        }
        None => {
            let page = parse_page_number(token, token)?;
            (page, page)
        }
    };

    if start > end {
        return Err(FilewerkError::Validation(format!(
            "range \"{token}\" is backwards; write it as {end}-{start}"
        )));
    }
    if end > page_count {
        return Err(FilewerkError::Validation(format!(
            "page {end} is past the end of the document ({page_count} pages)"
        )));
    }
    Ok(start..=end)
}

fn parse_page_number(text: &str, token: &str) -> Result<u32> {
    let page: u32 = text.parse().map_err(|_| {
        FilewerkError::Validation(format!("\"{token}\" is not a page number or range"))
    })?;
    if page == 0 {
        return Err(FilewerkError::Validation(
            "pages are numbered from 1".into(),
        ));
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_selection_resolves_to_zero_based_set() {
        assert_eq!(
            parse_page_selection("1,3,5-7", 10).expect("parse"),
            vec![0, 2, 4, 5, 6]
        );
    }

    #[test]
    fn overlapping_ranges_are_deduplicated() {
        assert_eq!(
            parse_page_selection(" 3-4 , 1 ,4-5", 5).expect("parse"),
            vec![0, 2, 3, 4]
        );
    }

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(
            parse_page_selection("0-2", 10),
            Err(FilewerkError::Validation(_))
        ));
        assert!(parse_page_selection("0", 10).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = parse_page_selection("5-3", 10).expect_err("backwards");
        assert!(err.to_string().contains("backwards"));
    }

    #[test]
    fn out_of_range_and_garbage_are_rejected() {
        assert!(parse_page_selection("11", 10).is_err());
        assert!(parse_page_selection("2-12", 10).is_err());
        assert!(parse_page_selection("two", 10).is_err());
        assert!(parse_page_selection("-3", 10).is_err());
        assert!(parse_page_selection(" , ", 10).is_err());
    }

    #[test]
    fn open_range_runs_to_last_page() {
        assert_eq!(parse_page_selection("8-", 10).expect("parse"), vec![7, 8, 9]);
    }

    #[test]
    fn syntax_check_ignores_page_count() {
        assert!(check_page_syntax("1-3,900").is_ok());
        assert!(check_page_syntax("12-").is_ok());
        assert!(check_page_syntax("3-1").is_err());
        assert!(check_page_syntax("").is_err());
    }

    #[test]
    fn groups_keep_input_order() {
        assert_eq!(
            parse_page_groups("4-5,1", 5).expect("parse"),
            vec![vec![3, 4], vec![0]]
        );
    }
}
