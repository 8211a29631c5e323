// Schema parser: recognizes statement heads for the target table and extracts
// the ordered column list from its CREATE TABLE statement.
// Like the rest of the parser this favors speed over a full SQL grammar.

use crate::parser::scanner::QuoteScanner;
use crate::parser::Schema;
use regex::Regex;

// Definitions inside a CREATE TABLE body that are not columns.
const NON_COLUMN_WORDS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "UNIQUE",
    "INDEX",
    "CONSTRAINT",
    "FOREIGN",
    "FULLTEXT",
    "SPATIAL",
    "CHECK",
];

// Optional schema qualifier followed by the table name, quoted with
// backticks, double quotes, brackets, or bare.
const TABLE_NAME: &str =
    r#"(?:[`"\[]?[^`"\]\s(.]+[`"\]]?\.)?[`"\[]?([^`"\]\s(]+)[`"\]]?"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Schema,
    Insert,
}

// Matches the first line of CREATE TABLE / INSERT statements for one table.
// Keywords and the table name are matched case-sensitively.
pub struct StatementMatcher {
    table: String,
    create_table_re: Regex,
    insert_re: Regex,
}

impl StatementMatcher {
    // Build regexes once for reuse.
    pub fn new(table: &str) -> Result<Self, regex::Error> {
        let create_table_re = Regex::new(&format!(
            r"^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{}",
            TABLE_NAME
        ))?;
        let insert_re = Regex::new(&format!(
            r"^INSERT\s+(?:IGNORE\s+)?INTO\s+{}",
            TABLE_NAME
        ))?;
        Ok(Self {
            table: table.to_string(),
            create_table_re,
            insert_re,
        })
    }

    // Classify a physical line. Lines for other tables yield None.
    pub fn classify(&self, line: &str) -> Option<StatementKind> {
        let line = line.trim_start();
        if line.starts_with("INSERT") {
            return self
                .names_table(&self.insert_re, line)
                .then_some(StatementKind::Insert);
        }
        if line.starts_with("CREATE") {
            return self
                .names_table(&self.create_table_re, line)
                .then_some(StatementKind::Schema);
        }
        None
    }

    fn names_table(&self, re: &Regex, line: &str) -> bool {
        re.captures(line)
            .and_then(|cap| cap.get(1))
            .map_or(false, |m| m.as_str() == self.table)
    }
}

// Extract column names from a full CREATE TABLE statement. Definitions are
// split on commas at paren depth one, so `DECIMAL(10,2)` stays whole.
pub fn extract_columns(statement: &str) -> Schema {
    let mut scanner = QuoteScanner::new();
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in statement.char_indices() {
        if !scanner.advance(c) {
            continue;
        }
        match c {
            '(' => {
                depth += 1;
                if depth == 1 {
                    start = Some(i + 1);
                }
            }
            ')' if depth == 1 => {
                if let Some(s) = start.take() {
                    columns.extend(column_name(&statement[s..i]));
                }
                break;
            }
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 1 => {
                if let Some(s) = start {
                    columns.extend(column_name(&statement[s..i]));
                }
                start = Some(i + 1);
            }
            _ => {}
        }
    }

    // Body never closed; keep what the last definition gives us.
    if let Some(s) = start {
        columns.extend(column_name(&statement[s..]));
    }
    columns
}

// The identifier leading one column definition, if it is a column at all.
fn column_name(definition: &str) -> Option<String> {
    let def = definition.trim();
    let mut chars = def.chars();
    let close = match chars.next()? {
        '`' => '`',
        '"' => '"',
        '[' => ']',
        _ => {
            let word = def
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or_default();
            let upper = word.to_ascii_uppercase();
            if NON_COLUMN_WORDS.contains(&upper.as_str())
                || !word.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            {
                return None;
            }
            return (!word.is_empty()).then(|| word.to_string());
        }
    };
    let rest = chars.as_str();
    let end = rest.find(close)?;
    let name = &rest[..end];
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MYSQL_CREATE: &str = "CREATE TABLE `users` (\n  \
        `id` int(11) NOT NULL AUTO_INCREMENT,\n  \
        `name` varchar(255) DEFAULT NULL COMMENT 'display, full',\n  \
        `balance` decimal(10,2) NOT NULL,\n  \
        PRIMARY KEY (`id`),\n  \
        UNIQUE KEY `name_idx` (`name`),\n  \
        CONSTRAINT `fk` FOREIGN KEY (`id`) REFERENCES `other` (`id`)\n\
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;\n";

    #[test]
    fn test_extract_mysql_columns() {
        assert_eq!(extract_columns(MYSQL_CREATE), vec!["id", "name", "balance"]);
    }

    #[test]
    fn test_extract_bracket_and_bare_identifiers() {
        let stmt = "CREATE TABLE [dbo].[t] ([a] INT, [b c] NVARCHAR(20), d TEXT, KEY k (d));";
        assert_eq!(extract_columns(stmt), vec!["a", "b c", "d"]);
    }

    #[test]
    fn test_extract_single_line_statement() {
        let stmt = r#"CREATE TABLE "notes" ("id" INTEGER, "body" TEXT);"#;
        assert_eq!(extract_columns(stmt), vec!["id", "body"]);
    }

    #[test]
    fn test_extract_without_columns_is_empty() {
        assert!(extract_columns("CREATE TABLE `x` LIKE `y`;").is_empty());
    }

    #[test]
    fn test_matcher_classifies_target_table_only() {
        let m = StatementMatcher::new("users").unwrap();
        assert_eq!(
            m.classify("CREATE TABLE `users` ("),
            Some(StatementKind::Schema)
        );
        assert_eq!(
            m.classify("CREATE TABLE IF NOT EXISTS `shop`.`users` ("),
            Some(StatementKind::Schema)
        );
        assert_eq!(
            m.classify("INSERT INTO `users` VALUES (1,'a');"),
            Some(StatementKind::Insert)
        );
        assert_eq!(
            m.classify("INSERT IGNORE INTO users (id) VALUES (1);"),
            Some(StatementKind::Insert)
        );
        assert_eq!(m.classify("INSERT INTO `users_old` VALUES (1);"), None);
        assert_eq!(m.classify("INSERT INTO `Users` VALUES (1);"), None);
        assert_eq!(m.classify("insert into `users` values (1);"), None);
        assert_eq!(m.classify("DROP TABLE IF EXISTS `users`;"), None);
    }
}
