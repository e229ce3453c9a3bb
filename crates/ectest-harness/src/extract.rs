//! Marker extraction.
//!
//! Three marker kinds are recognized, all anchored at column 0 of a line
//! (marker-looking text inside string literals is therefore never a
//! marker):
//!
//! - `/*---` ... `---*/`: one optional JSON metadata block
//! - `/*===` ... `===*/`: zero or more expectation blocks
//! - `/*@include NAME@*/`: include directives, one per line
//!
//! A block's interior starts after the newline that ends the opening
//! marker line and runs up to the closing marker line. The newline before
//! the closing marker belongs to the interior, so a block written as
//!
//! ```text
//! /*===
//! hello
//! ===*/
//! ```
//!
//! yields exactly `"hello\n"`. The executable body is the source with all
//! marker lines removed and everything else preserved byte-for-byte.

use crate::error::CorpusError;
use crate::metadata::TestMetadata;

/// The pieces of a test file after marker extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// Parsed metadata block, if the file has one.
    pub metadata: Option<TestMetadata>,
    /// Include names in declaration order, repeats dropped.
    pub includes: Vec<String>,
    /// Expectation block interiors in file order.
    pub expected_blocks: Vec<String>,
    /// Source with all marker regions removed.
    pub body: String,
}

/// Extract markers from raw test-file text.
pub fn extract(source: &str) -> Result<Extracted, CorpusError> {
    let mut metadata: Option<TestMetadata> = None;
    let mut includes: Vec<String> = Vec::new();
    let mut expected_blocks: Vec<String> = Vec::new();
    let mut body = String::new();

    // split_inclusive keeps each line terminator so interiors and the body
    // reassemble byte-for-byte.
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with("/*---") {
            if metadata.is_some() {
                return Err(CorpusError::DuplicateMetadata { line: i + 1 });
            }
            let (interior, next) = scan_block(&lines, i, "---*/", "metadata")?;
            metadata = Some(TestMetadata::parse(&interior)?);
            i = next;
        } else if line.starts_with("/*===") {
            let (interior, next) = scan_block(&lines, i, "===*/", "expectation")?;
            expected_blocks.push(interior);
            i = next;
        } else if let Some(rest) = line.strip_prefix("/*@include") {
            let name = parse_include(rest, i + 1)?;
            if !includes.contains(&name) {
                includes.push(name);
            }
            i += 1;
        } else {
            body.push_str(line);
            i += 1;
        }
    }

    Ok(Extracted {
        metadata,
        includes,
        expected_blocks,
        body,
    })
}

/// Collect the interior of a block opened at `open`; returns the interior
/// and the index of the first line past the closing marker.
fn scan_block(
    lines: &[&str],
    open: usize,
    close_marker: &str,
    kind: &'static str,
) -> Result<(String, usize), CorpusError> {
    let mut interior = String::new();
    for (j, line) in lines.iter().enumerate().skip(open + 1) {
        if line.starts_with(close_marker) {
            return Ok((interior, j + 1));
        }
        interior.push_str(line);
    }
    Err(CorpusError::UnterminatedMarker {
        marker: kind,
        line: open + 1,
    })
}

/// Parse the remainder of an include line (everything after `/*@include`).
fn parse_include(rest: &str, line: usize) -> Result<String, CorpusError> {
    let Some(at) = rest.find('@') else {
        return Err(CorpusError::UnterminatedMarker {
            marker: "include",
            line,
        });
    };
    if !rest[at + 1..].trim_start().starts_with("*/") {
        return Err(CorpusError::UnterminatedMarker {
            marker: "include",
            line,
        });
    }
    let name = rest[..at].trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(CorpusError::InvalidIncludeName(name.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn single_expectation_block() {
        let src = "/*===\nhello\n===*/\nprint('hello');\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.expected_blocks, vec!["hello\n"]);
        assert_eq!(ex.body, "print('hello');\n");
        assert!(ex.metadata.is_none());
        assert!(ex.includes.is_empty());
    }

    #[test]
    fn interior_preserves_blank_lines_and_trailing_newline() {
        let src = "/*===\na\n\nb\n===*/\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.expected_blocks, vec!["a\n\nb\n"]);
    }

    #[test]
    fn empty_block_means_empty_output() {
        let src = "/*===\n===*/\nvoid 0;\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.expected_blocks, vec![""]);
    }

    #[test]
    fn multiple_blocks_in_file_order() {
        let src = "/*===\na\n===*/\ntry { print('a'); } catch (e) {}\n/*===\nb\n===*/\ntry { print('b'); } catch (e) {}\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.expected_blocks, vec!["a\n", "b\n"]);
        assert_eq!(
            ex.body,
            "try { print('a'); } catch (e) {}\ntry { print('b'); } catch (e) {}\n"
        );
    }

    #[test]
    fn metadata_block_parsed_and_removed() {
        let src = "/*---\n{ \"slow\": true, \"custom\": true }\n---*/\nprint(1);\n";
        let ex = extract(src).unwrap();
        let meta = ex.metadata.unwrap();
        assert!(meta.slow);
        assert!(meta.custom);
        assert_eq!(ex.body, "print(1);\n");
    }

    #[test]
    fn includes_in_order_and_deduped() {
        let src = "/*@include util-base.js@*/\n/*@include util-buffer.js@*/\n/*@include util-base.js@*/\nhelper();\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.includes, vec!["util-base.js", "util-buffer.js"]);
        assert_eq!(ex.body, "helper();\n");
    }

    #[test]
    fn unicode_block_survives() {
        let src = "/*===\n\u{30c6}\u{30b9}\u{30c8}\n===*/\nprint('\u{30c6}\u{30b9}\u{30c8}');\n";
        let ex = extract(src).unwrap();
        assert_eq!(ex.expected_blocks, vec!["\u{30c6}\u{30b9}\u{30c8}\n"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let src = "/*---\n{ \"skip\": true }\n---*/\n/*@include util-base.js@*/\n/*===\nx\n===*/\nprint('x');\n";
        let first = extract(src).unwrap();
        let second = extract(src).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn marker_not_at_column_zero_stays_in_body() {
        let src = "var s = 'a';\n  /*=== not a marker ===*/\nprint(s);\n";
        let ex = extract(src).unwrap();
        assert!(ex.expected_blocks.is_empty());
        assert_eq!(ex.body, src);
    }

    #[test]
    fn unterminated_expectation_is_an_error() {
        let err = extract("/*===\nhello\n").unwrap_err();
        assert!(matches!(
            err,
            CorpusError::UnterminatedMarker {
                marker: "expectation",
                line: 1
            }
        ));
    }

    #[test]
    fn duplicate_metadata_is_an_error() {
        let src = "/*---\n{}\n---*/\n/*---\n{}\n---*/\n";
        let err = extract(src).unwrap_err();
        assert!(matches!(err, CorpusError::DuplicateMetadata { line: 4 }));
    }

    #[test]
    fn malformed_metadata_json_is_an_error() {
        let src = "/*---\n{ skip: true }\n---*/\n";
        assert!(matches!(
            extract(src).unwrap_err(),
            CorpusError::MalformedMetadata(_)
        ));
    }

    #[test]
    fn include_with_path_separator_is_rejected() {
        let err = extract("/*@include ../escape.js@*/\n").unwrap_err();
        assert!(matches!(err, CorpusError::InvalidIncludeName(_)));
    }

    #[test]
    fn include_without_closing_at_is_an_error() {
        let err = extract("/*@include util-base.js*/\n").unwrap_err();
        assert!(matches!(
            err,
            CorpusError::UnterminatedMarker {
                marker: "include",
                ..
            }
        ));
    }

    #[test]
    fn closing_marker_on_last_line_without_newline() {
        let ex = extract("/*===\nx\n===*/").unwrap();
        assert_eq!(ex.expected_blocks, vec!["x\n"]);
        assert_eq!(ex.body, "");
    }
}
