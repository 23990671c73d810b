//! Parsing of the analysis tool's `top` table.
//!
//! The tool prints a few preamble lines, a header such as
//!
//! ```text
//!       flat  flat%   sum%        cum   cum%
//!      1.20s 40.00% 40.00%      1.50s 50.00%  runtime.mallocgc
//! ```
//!
//! and then one row per entry in significance order. This is the only place
//! that knows the table layout.

use serde::{Deserialize, Serialize};

const HEADER_TOKEN: &str = "flat";
const ROW_TOKENS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlatCumRow {
    /// Resource usage attributed to the function itself.
    pub flat: String,
    #[serde(rename = "flatPercent")]
    pub flat_percent: String,
    /// Running total of `flat_percent` down to this row.
    #[serde(rename = "sumPercent")]
    pub sum_percent: String,
    /// Usage including everything the function calls.
    pub cum: String,
    #[serde(rename = "cumPercent")]
    pub cum_percent: String,
    pub code: String,
}

/// Extracts at most `limit` rows. A short or malformed table yields fewer
/// rows, never an error.
pub fn parse_flat_cum(output: &str, limit: usize) -> Vec<FlatCumRow> {
    let mut rows = Vec::new();
    if limit == 0 {
        return rows;
    }

    let mut lines = output.lines();
    if !lines
        .by_ref()
        .any(|line| line.split_whitespace().any(|token| token == HEADER_TOKEN))
    {
        return rows;
    }

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.len() < ROW_TOKENS {
            break;
        }
        rows.push(FlatCumRow {
            flat: tokens[0].to_string(),
            flat_percent: tokens[1].to_string(),
            sum_percent: tokens[2].to_string(),
            cum: tokens[3].to_string(),
            cum_percent: tokens[4].to_string(),
            code: tokens[5].to_string(),
        });
        if rows.len() >= limit {
            break;
        }
    }
    rows
}
