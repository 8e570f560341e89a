//! Statement text preprocessing.
//!
//! Some native client libraries misparse comments that contain quote
//! characters, so comments are removed before the text reaches the client.
//! Literal contents are copied verbatim (backslashes and foreign quote
//! characters included), so this pass is not an injection defense and must
//! not be relied on as one.

/// One left-to-right scan over a statement:
/// quoted string/identifier literals are copied verbatim (tracking the
/// opening delimiter, so the other quote character passes through
/// unexamined), block comments collapse to a single space, line comments are
/// dropped up to but excluding the terminating newline, and everything else
/// is copied unchanged.
pub fn process_statement(text: &str) -> String {
    let source: Vec<char> = text.chars().collect();
    let mut processed = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < source.len() {
        let ch = source[pos];
        if ch == '\'' || ch == '"' {
            let delimiter = ch;
            processed.push(delimiter);
            pos += 1;
            while pos < source.len() && source[pos] != delimiter {
                processed.push(source[pos]);
                pos += 1;
            }
            if pos < source.len() {
                processed.push(delimiter);
                pos += 1;
            }
        } else if ch == '/' {
            pos += 1;
            if pos >= source.len() || source[pos] != '*' {
                processed.push(ch);
            } else {
                pos += 1;
                loop {
                    while pos < source.len() && source[pos] != '*' {
                        pos += 1;
                    }
                    pos += 1;
                    if pos >= source.len() || source[pos] == '/' {
                        break;
                    }
                }
                pos += 1;
                // The comment collapses to a single space.
                processed.push(' ');
            }
        } else if ch == '-' {
            pos += 1;
            if pos >= source.len() || source[pos] != '-' {
                processed.push(ch);
            } else {
                pos += 1;
                while pos < source.len() && source[pos] != '\n' {
                    pos += 1;
                }
                // The newline itself survives and replaces the comment.
            }
        } else {
            processed.push(ch);
            pos += 1;
        }
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(
            process_statement("SELECT a, b FROM t WHERE x = ?"),
            "SELECT a, b FROM t WHERE x = ?"
        );
    }

    #[test]
    fn test_block_comment_becomes_one_space() {
        assert_eq!(
            process_statement("SELECT/* comment */1"),
            "SELECT 1"
        );
        assert_eq!(
            process_statement("SELECT /* multi\nline */ 1"),
            "SELECT   1"
        );
    }

    #[test]
    fn test_block_comment_with_quote_removed() {
        assert_eq!(
            process_statement("SELECT 1 /* don't */ FROM t"),
            "SELECT 1   FROM t"
        );
    }

    #[test]
    fn test_line_comment_dropped_newline_kept() {
        assert_eq!(
            process_statement("SELECT 1 -- comment\nFROM t"),
            "SELECT 1 \nFROM t"
        );
        assert_eq!(process_statement("SELECT 1 -- trailing"), "SELECT 1 ");
    }

    #[test]
    fn test_quotes_protect_comment_markers() {
        assert_eq!(
            process_statement("SELECT '--not a comment' FROM t"),
            "SELECT '--not a comment' FROM t"
        );
        assert_eq!(
            process_statement("SELECT \"/*name*/\" FROM t"),
            "SELECT \"/*name*/\" FROM t"
        );
    }

    #[test]
    fn test_other_quote_kind_passes_through_in_literal() {
        // A double quote inside a single-quoted literal is plain content.
        assert_eq!(
            process_statement("SELECT 'he said \"hi\"'"),
            "SELECT 'he said \"hi\"'"
        );
        assert_eq!(
            process_statement("SELECT \"it's\""),
            "SELECT \"it's\""
        );
    }

    #[test]
    fn test_backslashes_copied_verbatim() {
        // No escape handling: the backslash and its quote stay as written.
        assert_eq!(
            process_statement(r"SELECT 'a\' -- x"),
            r"SELECT 'a\' "
        );
    }

    #[test]
    fn test_unterminated_literal_copied() {
        assert_eq!(process_statement("SELECT 'open"), "SELECT 'open");
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert_eq!(process_statement("SELECT 1 /* open"), "SELECT 1  ");
    }

    #[test]
    fn test_minus_and_slash_alone_survive() {
        assert_eq!(process_statement("SELECT 5-3, 8/2"), "SELECT 5-3, 8/2");
        assert_eq!(process_statement("SELECT a - b"), "SELECT a - b");
    }

    #[test]
    fn test_star_inside_block_comment() {
        assert_eq!(process_statement("SELECT/* a*b**c */9"), "SELECT 9");
    }
}
