//! Source excerpts for error messages.
//!
//! Both helpers show up to two lines of context on each side of the
//! offending region and mark the offending lines with `>>`.

/// Excerpt around a syntax error at `line`.
///
/// ```text
///  1	    | <div>
///  2	 >> | <p a=>
///  3	    | </div>
/// ```
pub fn syntax_snippet(source: &str, line: usize) -> String {
    excerpt(source, line, line, |num, marked, text| {
        if marked {
            format!(" {num}\t >> | {text}")
        } else {
            format!(" {num}\t    | {text}")
        }
    })
}

/// Excerpt around the line range recorded while rendering.
///
/// ```text
///  1    | a
///  2 >> | <% throw Error('hi') %>
///  3    | b
/// ```
pub fn range_snippet(source: &str, start: usize, end: usize) -> String {
    excerpt(source, start, end, |num, marked, text| {
        if marked {
            format!(" {num} >> | {text}")
        } else {
            format!(" {num}    | {text}")
        }
    })
}

fn excerpt(
    source: &str,
    start: usize,
    end: usize,
    format_line: impl Fn(usize, bool, &str) -> String,
) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let from = start.saturating_sub(2).max(1) - 1;
    let to = (end + 2).min(lines.len());

    lines
        .iter()
        .enumerate()
        .take(to)
        .skip(from)
        .map(|(i, text)| {
            let num = i + 1;
            format_line(num, num >= start && num <= end, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range_snippet_marks_line() {
        let snippet = range_snippet("a\n<% throw Error('hi') %>\nb", 2, 2);
        assert_eq!(
            snippet,
            " 1    | a\n 2 >> | <% throw Error('hi') %>\n 3    | b"
        );
    }

    #[test]
    fn test_range_snippet_multi_line() {
        let snippet = range_snippet("1\n2\n3\n4\n5\n6\n7", 3, 4);
        assert_eq!(
            snippet,
            " 1    | 1\n 2    | 2\n 3 >> | 3\n 4 >> | 4\n 5    | 5\n 6    | 6"
        );
    }

    #[test]
    fn test_range_snippet_clamps_at_start() {
        let snippet = range_snippet("only", 0, 0);
        assert_eq!(snippet, " 1    | only");
    }

    #[test]
    fn test_syntax_snippet() {
        let snippet = syntax_snippet("<div>\n<p a=>\n</div>", 2);
        assert_eq!(
            snippet,
            " 1\t    | <div>\n 2\t >> | <p a=>\n 3\t    | </div>"
        );
    }
}
