// INSERT parser: locates the VALUES clause, splits it into tuples and each
// tuple into cleaned column values. No full SQL grammar, just quote-aware scans.

use crate::error::StatementError;
use crate::parser::scanner::QuoteScanner;
use crate::parser::{normalize_row, project_row, ArityPolicy, Normalized, Row};

// Rows produced by one INSERT statement, already fitted to the schema.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpandedInsert {
    pub rows: Vec<Row>,
    pub padded: u64,
    pub truncated: u64,
    pub rejected: u64,
}

// Expand a complete INSERT statement into schema-width rows, in tuple order.
pub fn expand_insert(
    statement: &str,
    schema: &[String],
    policy: ArityPolicy,
) -> Result<ExpandedInsert, StatementError> {
    let insert = parse_insert(statement)?;
    let mut out = ExpandedInsert::default();
    let mut tuples = 0usize;

    for tuple in insert.tuples() {
        tuples += 1;
        let mut values = split_values(tuple);
        if let Some(columns) = &insert.columns {
            values = project_row(schema, columns, values);
        }
        match normalize_row(values, schema.len(), policy) {
            Normalized::Exact(row) => out.rows.push(row),
            Normalized::Adjusted { row, found } => {
                if found < schema.len() {
                    out.padded += 1;
                } else {
                    out.truncated += 1;
                }
                out.rows.push(row);
            }
            Normalized::Rejected { .. } => out.rejected += 1,
        }
    }

    if tuples == 0 {
        return Err(StatementError::NoTuples);
    }
    Ok(out)
}

// The parts of one INSERT statement the driver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement<'a> {
    // Explicit column list, when the statement names one.
    pub columns: Option<Vec<String>>,
    // Text after VALUES with the trailing terminator removed.
    pub values: &'a str,
}

impl<'a> InsertStatement<'a> {
    pub fn tuples(&self) -> Tuples<'a> {
        Tuples::new(self.values)
    }
}

// Parse the head of a complete INSERT statement.
pub fn parse_insert(statement: &str) -> Result<InsertStatement<'_>, StatementError> {
    let values_pos = find_values_keyword(statement).ok_or(StatementError::MissingValues)?;
    let head = &statement[..values_pos];
    let columns = parse_column_list(head)?;

    let values = statement[values_pos + "VALUES".len()..].trim();
    let values = values.strip_suffix(';').unwrap_or(values).trim_end();
    if values.is_empty() {
        return Err(StatementError::NoTuples);
    }
    Ok(InsertStatement { columns, values })
}

// Byte offset of the top-level VALUES keyword, matched case-insensitively as a
// whole word. Backtick and bracket quoted identifiers are skipped.
fn find_values_keyword(statement: &str) -> Option<usize> {
    let mut scanner = QuoteScanner::new();
    let mut ident_close: Option<char> = None;
    let mut prev: Option<char> = None;
    for (i, c) in statement.char_indices() {
        if let Some(close) = ident_close {
            if c == close {
                ident_close = None;
            }
            prev = Some(c);
            continue;
        }
        let top = scanner.advance(c);
        if top && c == '`' {
            ident_close = Some('`');
        } else if top && c == '[' {
            ident_close = Some(']');
        } else if top && (c == 'V' || c == 'v') && !prev.map_or(false, is_word_char) {
            let is_keyword = statement
                .get(i..i + 6)
                .map_or(false, |w| w.eq_ignore_ascii_case("VALUES"));
            let next = statement[i..].chars().nth(6);
            if is_keyword && !next.map_or(false, is_word_char) {
                return Some(i);
            }
        }
        prev = Some(c);
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// `INSERT INTO t (a, `b`) ` -> Some(["a", "b"]); no parenthesis -> None.
fn parse_column_list(head: &str) -> Result<Option<Vec<String>>, StatementError> {
    let open = match head.find('(') {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let close = head.rfind(')').ok_or(StatementError::UnbalancedColumnList)?;
    if close < open {
        return Err(StatementError::UnbalancedColumnList);
    }
    let columns = head[open + 1..close]
        .split(',')
        .map(|col| col.trim().trim_matches(['`', '"', '[', ']'].as_ref()).to_string())
        .filter(|col| !col.is_empty())
        .collect::<Vec<_>>();
    Ok(Some(columns))
}

// Lazy splitter over a VALUES list: yields each tuple's inner text in order.
// A boundary is a top-level `)` followed by `,` and `(` (whitespace allowed).
pub struct Tuples<'a> {
    text: &'a str,
    pos: usize,
    scanner: QuoteScanner,
}

impl<'a> Tuples<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            scanner: QuoteScanner::new(),
        }
    }

    // End of the tuple starting at `start` and where the next one begins.
    fn next_boundary(&mut self, start: usize) -> Option<(usize, usize)> {
        for (off, c) in self.text[start..].char_indices() {
            if !self.scanner.advance(c) || c != ')' {
                continue;
            }
            let close = start + off;
            let after = self.text[close + 1..].trim_start();
            if let Some(next) = after.strip_prefix(',') {
                let next = next.trim_start();
                if next.starts_with('(') {
                    return Some((close + 1, self.text.len() - next.len()));
                }
            }
        }
        None
    }
}

impl<'a> Iterator for Tuples<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let text = self.text;
        while self.pos < text.len() {
            let start = self.pos;
            let raw = match self.next_boundary(start) {
                Some((end, next)) => {
                    self.pos = next;
                    &text[start..end]
                }
                None => {
                    self.pos = text.len();
                    &text[start..]
                }
            };
            if let Some(tuple) = trim_tuple(raw) {
                return Some(tuple);
            }
        }
        None
    }
}

// Drop one layer of parentheses; empty tuples are skipped.
fn trim_tuple(raw: &str) -> Option<&str> {
    let t = raw.trim();
    let t = t.strip_prefix('(').unwrap_or(t);
    let t = t.strip_suffix(')').unwrap_or(t);
    let t = t.trim();
    (!t.is_empty()).then_some(t)
}

// Split one tuple into cleaned values on top-level commas. Commas nested in
// unquoted parentheses (function calls) do not split.
pub fn split_values(tuple: &str) -> Row {
    let mut values = Vec::new();
    let mut scanner = QuoteScanner::new();
    let mut depth = 0i32;
    let mut start = 0usize;

    for (i, c) in tuple.char_indices() {
        if !scanner.advance(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth <= 0 => {
                values.push(clean_value(&tuple[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    values.push(clean_value(&tuple[start..]));
    values
}

// Trim, map NULL to empty, strip one layer of matching quotes, unescape.
pub fn clean_value(token: &str) -> String {
    let t = token.trim();
    if t.eq_ignore_ascii_case("NULL") {
        return String::new();
    }
    let inner = ['\'', '"']
        .iter()
        .find_map(|q| {
            (t.len() >= 2 && t.starts_with(*q) && t.ends_with(*q)).then(|| &t[1..t.len() - 1])
        })
        .unwrap_or(t);
    unescape(inner)
}

// Resolve \' \" and \\ in one left-to-right pass. Other backslashes pass through.
pub fn unescape(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next @ ('\'' | '"' | '\\')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(tuple: &str) -> Vec<String> {
        split_values(tuple)
    }

    #[test]
    fn test_parse_insert_plain() {
        let stmt = parse_insert("INSERT INTO `users` VALUES (1,'a'),(2,'b');").unwrap();
        assert_eq!(stmt.columns, None);
        assert_eq!(stmt.values, "(1,'a'),(2,'b')");
    }

    #[test]
    fn test_parse_insert_with_column_list() {
        let stmt =
            parse_insert("INSERT INTO `users` (`id`, `name`) values\n(1,'a');\n").unwrap();
        assert_eq!(stmt.columns, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(stmt.values, "(1,'a')");
    }

    #[test]
    fn test_values_inside_string_is_not_keyword() {
        let stmt = parse_insert("INSERT INTO t VALUES ('VALUES', 'x values y');").unwrap();
        assert_eq!(stmt.values, "('VALUES', 'x values y')");
    }

    #[test]
    fn test_quoted_identifier_named_values() {
        let stmt =
            parse_insert("INSERT INTO `t` (`id`,`values`) VALUES (1,'a'),(2,'b');").unwrap();
        assert_eq!(stmt.columns, Some(vec!["id".to_string(), "values".to_string()]));
        assert_eq!(stmt.values, "(1,'a'),(2,'b')");

        let stmt = parse_insert("INSERT INTO `values` VALUES (1,'a');").unwrap();
        assert_eq!(stmt.columns, None);
        assert_eq!(stmt.values, "(1,'a')");

        let stmt = parse_insert("INSERT INTO [values] ([it's]) VALUES (1);").unwrap();
        assert_eq!(stmt.columns, Some(vec!["it's".to_string()]));
        assert_eq!(stmt.values, "(1)");
    }

    #[test]
    fn test_parse_insert_errors() {
        assert_eq!(
            parse_insert("INSERT INTO `users` SELECT * FROM other;"),
            Err(StatementError::MissingValues)
        );
        assert_eq!(
            parse_insert("INSERT INTO `users` VALUES ;"),
            Err(StatementError::NoTuples)
        );
        assert_eq!(
            parse_insert("INSERT INTO `users` (`id` VALUES (1);"),
            Err(StatementError::UnbalancedColumnList)
        );
    }

    #[test]
    fn test_tuples_respect_quotes() {
        let tuples: Vec<&str> = Tuples::new("(1,'x'),(2,'y,z')").collect();
        assert_eq!(tuples, vec!["1,'x'", "2,'y,z'"]);
    }

    #[test]
    fn test_tuples_ignore_boundary_inside_literal() {
        let tuples: Vec<&str> = Tuples::new("(1,'a),(b'),\n  (2,'it\\'s),(')").collect();
        assert_eq!(tuples, vec!["1,'a),(b'", "2,'it\\'s),('"]);
    }

    #[test]
    fn test_tuples_with_nested_parens_and_whitespace() {
        let tuples: Vec<&str> = Tuples::new("(1, POINT(1,2)) , (2, f(3))").collect();
        assert_eq!(tuples, vec!["1, POINT(1,2)", "2, f(3)"]);
    }

    #[test]
    fn test_empty_tuples_are_skipped() {
        let tuples: Vec<&str> = Tuples::new("(1),(  ),(3)").collect();
        assert_eq!(tuples, vec!["1", "3"]);
    }

    #[test]
    fn test_split_values_keeps_quoted_commas() {
        assert_eq!(values("'a,b', 5"), vec!["a,b", "5"]);
        assert_eq!(values("1,'Alice','hi, there'"), vec!["1", "Alice", "hi, there"]);
    }

    #[test]
    fn test_null_mapping() {
        assert_eq!(values("NULL,null,NuLl"), vec!["", "", ""]);
        assert_eq!(values("'NULL',\"NULL\""), vec!["NULL", "NULL"]);
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(values(r"'it\'s'"), vec!["it's"]);
        assert_eq!(values(r#"'say \"hi\"'"#), vec![r#"say "hi""#]);
        assert_eq!(values(r"'C:\\temp'"), vec![r"C:\temp"]);
        // \\ followed by ' must not turn into an escaped quote.
        assert_eq!(unescape(r"a\\'b"), r"a\'b");
    }

    #[test]
    fn test_unescape_is_identity_on_clean_input() {
        for clean in ["plain", "with space", "semi;colon", "", "ümlaut"] {
            assert_eq!(unescape(clean), clean);
        }
    }

    #[test]
    fn test_malformed_escape_passes_through() {
        assert_eq!(unescape(r"line\nbreak"), r"line\nbreak");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_expand_insert_normalizes_arity() {
        let schema = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let stmt = "INSERT INTO t VALUES (1),(1,2,3,4,5),(1,2,3);";
        let lenient = expand_insert(stmt, &schema, ArityPolicy::Lenient).unwrap();
        assert_eq!(lenient.rows.len(), 3);
        assert_eq!(lenient.rows[0], vec!["1", "", ""]);
        assert_eq!(lenient.rows[1], vec!["1", "2", "3"]);
        assert_eq!((lenient.padded, lenient.truncated), (1, 1));

        let strict = expand_insert(stmt, &schema, ArityPolicy::Strict).unwrap();
        assert_eq!(strict.rows, vec![vec!["1", "2", "3"]]);
        assert_eq!(strict.rejected, 2);
    }

    #[test]
    fn test_expand_insert_projects_column_list() {
        let schema = vec!["id".to_string(), "name".to_string(), "note".to_string()];
        let stmt = "INSERT INTO t (`name`, `id`) VALUES ('Bob', 2);";
        let expanded = expand_insert(stmt, &schema, ArityPolicy::Lenient).unwrap();
        assert_eq!(expanded.rows, vec![vec!["2", "Bob", ""]]);
    }

    #[test]
    fn test_expand_insert_only_empty_tuples() {
        let schema = vec!["id".to_string()];
        assert_eq!(
            expand_insert("INSERT INTO t VALUES (),( );", &schema, ArityPolicy::Lenient),
            Err(StatementError::NoTuples)
        );
    }

    #[test]
    fn test_function_call_value_not_split() {
        assert_eq!(values("1, CONCAT('a', 'b'), 3"), vec!["1", "CONCAT('a', 'b')", "3"]);
    }
}
