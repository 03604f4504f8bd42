//! Source Map v3 output.
//!
//! Mappings are encoded as base64 VLQ segments: generated column, source
//! index, original line, original column, each relative to the previous
//! segment (the generated column resets on every line).

use serde::Serialize;

/// A zero-based position in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    pub line: usize,
    pub column: usize,
}

/// One segment: a generated position and, unless it only closes the
/// previous segment, the template position it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: usize,
    pub generated_column: usize,
    pub original: Option<OriginalPosition>,
}

#[derive(Serialize)]
struct SourceMap<'a> {
    version: u8,
    file: String,
    sources: [&'a str; 1],
    names: [&'a str; 0],
    mappings: String,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    sources_content: Option<[&'a str; 1]>,
}

/// Serialize a source map for `filename`, embedding `source` when given.
pub fn render(filename: &str, mappings: &[Mapping], source: Option<&str>) -> String {
    let map = SourceMap {
        version: 3,
        file: format!("{filename}.js"),
        sources: [filename],
        names: [],
        mappings: encode_mappings(mappings),
        sources_content: source.map(|s| [s]),
    };
    // Only strings and numbers: serialization cannot fail
    serde_json::to_string(&map).unwrap_or_default()
}

/// Encode mappings (sorted by generated position) into the `mappings` field.
pub fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    let mut line = 0;
    let mut first_in_line = true;
    let mut prev_column = 0i64;
    let mut prev_original_line = 0i64;
    let mut prev_original_column = 0i64;

    for mapping in mappings {
        while line < mapping.generated_line {
            out.push(';');
            line += 1;
            first_in_line = true;
            prev_column = 0;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        let column = mapping.generated_column as i64;
        encode_vlq(column - prev_column, &mut out);
        prev_column = column;

        if let Some(original) = mapping.original {
            let original_line = original.line as i64;
            let original_column = original.column as i64;
            encode_vlq(0, &mut out);
            encode_vlq(original_line - prev_original_line, &mut out);
            encode_vlq(original_column - prev_original_column, &mut out);
            prev_original_line = original_line;
            prev_original_column = original_column;
        }
    }

    out
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 31) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 32;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(value, &mut out);
        out
    }

    fn mapped(generated_line: usize, generated_column: usize, line: usize, column: usize) -> Mapping {
        Mapping {
            generated_line,
            generated_column,
            original: Some(OriginalPosition { line, column }),
        }
    }

    #[test]
    fn test_vlq_digits() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
    }

    #[test]
    fn test_mappings_across_lines() {
        let mappings = [
            mapped(0, 4, 1, 3),
            Mapping {
                generated_line: 0,
                generated_column: 9,
                original: None,
            },
            mapped(2, 0, 2, 0),
        ];
        assert_eq!(encode_mappings(&mappings), "IACG,K;;AACH");
    }

    #[test]
    fn test_render_json() {
        let map = render("page", &[mapped(0, 0, 0, 0)], None);
        let json: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": 3,
                "file": "page.js",
                "sources": ["page"],
                "names": [],
                "mappings": "AAAA",
            })
        );

        let with_source = render("page", &[], Some("<p>"));
        assert!(with_source.contains(r#""sourcesContent":["<p>"]"#));
    }
}
