//! Splitting the server's concatenated outputs back into per-query records.
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Split a concatenated A3M stream into one block per query tag.
///
/// Records of different queries are separated by NUL bytes. The first header
/// after a separator (or at the start of the stream) names the query tag. The
/// text of each block is kept verbatim apart from the separators.
pub fn split_a3m_by_tag(text: &str, file: &str) -> Result<BTreeMap<usize, String>> {
    let mut blocks: BTreeMap<usize, String> = BTreeMap::new();
    let mut current: Option<usize> = None;
    let mut expect_header = true;
    for raw in text.split_inclusive('\n') {
        let line = if raw.contains('\0') {
            expect_header = true;
            raw.replace('\0', "")
        } else {
            raw.to_string()
        };
        if line.trim().is_empty() && current.is_none() {
            continue;
        }
        if expect_header && line.starts_with('>') {
            let tag_text = line[1..].trim();
            let tag = tag_text.parse::<usize>().map_err(|_| Error::Format {
                file: file.to_string(),
                reason: format!("expected a numeric query tag, found '{}'", tag_text),
            })?;
            current = Some(tag);
            expect_header = false;
        }
        let tag = current.ok_or_else(|| Error::Format {
            file: file.to_string(),
            reason: "alignment text before the first query header".to_string(),
        })?;
        blocks.entry(tag).or_default().push_str(&line);
    }
    Ok(blocks)
}

/// Parse a `pdb70.m8` hit table into the template ids for each query tag, in file order.
pub fn parse_m8(text: &str, file: &str) -> Result<BTreeMap<usize, Vec<String>>> {
    let mut hits: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut columns = line.split_whitespace();
        let (Some(tag), Some(target)) = (columns.next(), columns.next()) else {
            return Err(Error::Format {
                file: file.to_string(),
                reason: format!("expected at least two columns in '{}'", line),
            });
        };
        let tag = tag.parse::<usize>().map_err(|_| Error::Format {
            file: file.to_string(),
            reason: format!("non numeric query tag '{}'", tag),
        })?;
        hits.entry(tag).or_default().push(target.to_string());
    }
    Ok(hits)
}
