use std::{fs::File, io::{BufReader, Read}};

use serde::Deserialize;

use crate::error::{Error, Result};

/// one row of an edge list CSV (`source,target`)
#[derive(Debug, Deserialize)]
struct EdgeRecord {
    source: String,
    target: String,
}

/// read an edge list CSV file with header `source,target`
pub fn read_edge_list(filepath: &str) -> Result<Vec<(String, String)>> {
    let reader = BufReader::new(File::open(filepath)?);
    edges_from_reader(reader)
}

/// parse `(source, target)` label pairs from any CSV source
pub fn edges_from_reader<R: Read>(mut reader: R) -> Result<Vec<(String, String)>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let mut edges = Vec::new();
    let mut record = csv::StringRecord::new();

    loop {
        let has_record = rdr.read_record(&mut record);
        let row = line_ending_at(&text, rdr.position().byte());

        if !has_record.map_err(|e| invalid_edge(row, e))? {
            break;
        }

        let edge: EdgeRecord = record.deserialize(Some(&headers)).map_err(|e| invalid_edge(row, e))?;

        if edge.source.is_empty() || edge.target.is_empty() {
            return Err(Error::InvalidEdge {
                row,
                reason: String::from("empty node label"),
            });
        }

        edges.push((edge.source, edge.target));
    }

    Ok(edges)
}

/// 1-based line of the last record read before byte offset `end`
///
/// Comment and blank lines in front of the record are part of the consumed bytes,
/// so the line is counted back from the end of the record.
fn line_ending_at(text: &str, end: u64) -> usize {
    let consumed = &text.as_bytes()[..(end as usize).min(text.len())];
    let record_end = consumed
        .iter()
        .rposition(|byte| *byte != b'\n' && *byte != b'\r')
        .map_or(0, |last| last + 1);

    consumed[..record_end].iter().filter(|byte| **byte == b'\n').count() + 1
}

fn invalid_edge(row: usize, error: csv::Error) -> Error {
    Error::InvalidEdge {
        row,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edge_list_with_comments_and_whitespace() {
        let data = "source,target\n# a comment\na, b\nb,c\n";
        let edges = edges_from_reader(data.as_bytes()).unwrap();
        assert_eq!(
            edges,
            vec![
                (String::from("a"), String::from("b")),
                (String::from("b"), String::from("c"))
            ]
        );
    }

    #[test]
    fn rejects_row_with_missing_target() {
        let data = "source,target\na,b\nc\n";
        match edges_from_reader(data.as_bytes()) {
            Err(Error::InvalidEdge { row, .. }) => assert_eq!(row, 3),
            other => panic!("expected InvalidEdge, got {:?}", other),
        }
    }

    #[test]
    fn reports_input_line_after_comments() {
        let data = "source,target\n# first comment\n# second comment\na,b\n\n# third\nc\n";
        match edges_from_reader(data.as_bytes()) {
            Err(Error::InvalidEdge { row, .. }) => assert_eq!(row, 7),
            other => panic!("expected InvalidEdge, got {:?}", other),
        }

        let data = "source,target\r\n# comment\r\na,\r\n";
        assert!(matches!(
            edges_from_reader(data.as_bytes()),
            Err(Error::InvalidEdge { row: 3, .. })
        ));
    }

    #[test]
    fn rejects_empty_label() {
        let data = "source,target\na,\n";
        assert!(matches!(
            edges_from_reader(data.as_bytes()),
            Err(Error::InvalidEdge { row: 2, .. })
        ));
    }
}
