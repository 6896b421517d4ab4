//! Rewrites broker statements into the destination backend's dialect.
//!
//! The embedded store understands the universal `?` placeholder and
//! `INSERT OR IGNORE` natively, so its statements pass through. The network
//! store gets numbered placeholders, a plain or explicitly keyed insert, and a
//! `RETURNING id` clause so every insert reports its generated key.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::query::Query;
use super::topology::Backend;

static INSERT_OR_IGNORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*INSERT\s+OR\s+IGNORE\b").expect("insert-or-ignore pattern is valid")
});

static RETURNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRETURNING\b").expect("returning pattern is valid"));

static ON_CONFLICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bON\s+CONFLICT\b").expect("on-conflict pattern is valid"));

pub fn translate(query: &Query, backend: Backend) -> String {
    match backend {
        Backend::Embedded => translate_embedded(query),
        Backend::Network => translate_network(query),
    }
}

fn translate_embedded(query: &Query) -> String {
    let sql = query.sql();
    if query.conflict_key().is_empty() || !is_insert(sql) || has_on_conflict(sql) {
        return sql.to_string();
    }
    let sql = INSERT_OR_IGNORE.replace(trim_statement(sql), "INSERT");
    insert_before_returning(&sql, &conflict_clause(query.conflict_key()))
}

fn translate_network(query: &Query) -> String {
    let numbered = number_placeholders(query.sql());
    let mut sql = trim_statement(&numbered).to_string();
    if !is_insert(&sql) {
        return sql;
    }

    if INSERT_OR_IGNORE.is_match(&sql) {
        sql = INSERT_OR_IGNORE.replace(&sql, "INSERT").into_owned();
        if query.conflict_key().is_empty() {
            warn!(
                "insert-or-ignore rewritten to plain insert on network backend, conflicts will fail table={}",
                query.table().unwrap_or_default()
            );
        }
    }

    if !query.conflict_key().is_empty() && !has_on_conflict(&sql) {
        sql = insert_before_returning(&sql, &conflict_clause(query.conflict_key()));
    }

    if !has_returning(&sql) {
        sql = append_clause(&sql, "RETURNING id");
    }
    sql
}

/// Replaces each `?` in code position with `$1`, `$2`, ... in left-to-right
/// order. Literals, quoted identifiers, comments and dollar-quoted bodies are
/// copied untouched.
pub fn number_placeholders(sql: &str) -> String {
    let code = code_mask(sql);
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;

    for (pos, ch) in sql.char_indices() {
        if ch == '?' && code[pos] {
            index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

/// True when the statement carries its own top-level `RETURNING` clause.
pub fn has_returning(sql: &str) -> bool {
    find_returning(sql).is_some()
}

pub fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

fn trim_statement(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

fn conflict_clause(columns: &[String]) -> String {
    format!("ON CONFLICT ({}) DO NOTHING", columns.join(", "))
}

fn insert_before_returning(sql: &str, clause: &str) -> String {
    match find_returning(sql) {
        Some(start) => {
            let (head, tail) = sql.split_at(start);
            format!("{} {} {}", head.trim_end(), clause, tail)
        }
        None => append_clause(sql, clause),
    }
}

// A trailing `--` comment would swallow the clause, so it goes on a new line.
fn append_clause(sql: &str, clause: &str) -> String {
    if code_mask(sql).last() == Some(&false) {
        format!("{sql}\n{clause}")
    } else {
        format!("{sql} {clause}")
    }
}

fn has_on_conflict(sql: &str) -> bool {
    ON_CONFLICT.is_match(&mask_non_code(sql))
}

// Byte offset of the first RETURNING keyword outside literals, comments and
// parentheses.
fn find_returning(sql: &str) -> Option<usize> {
    let masked = mask_non_code(sql);
    RETURNING
        .find_iter(&masked)
        .map(|found| found.start())
        .find(|&start| paren_depth(&masked[..start]) == 0)
}

fn paren_depth(code: &str) -> i64 {
    code.bytes().fold(0, |depth, b| match b {
        b'(' => depth + 1,
        b')' => depth - 1,
        _ => depth,
    })
}

/// Copy of `sql` with every non-code byte blanked, so byte offsets line up
/// with the original.
fn mask_non_code(sql: &str) -> String {
    let code = code_mask(sql);
    let mut out = String::with_capacity(sql.len());
    for (pos, ch) in sql.char_indices() {
        if code[pos] {
            out.push(ch);
        } else {
            out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        }
    }
    out
}

/// One flag per byte: `true` for code, `false` inside a string literal,
/// quoted identifier, `--` or `/* */` comment, or `$tag$` body.
fn code_mask(sql: &str) -> Vec<bool> {
    let bytes = sql.as_bytes();
    let mut code = vec![true; bytes.len()];
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'\'' | b'"' => Some(quote_end(bytes, i)),
            b'-' if bytes.get(i + 1) == Some(&b'-') => Some(line_comment_end(bytes, i)),
            b'/' if bytes.get(i + 1) == Some(&b'*') => Some(block_comment_end(bytes, i)),
            b'$' => dollar_quote_end(bytes, i),
            _ => None,
        };
        match end {
            Some(end) => {
                code[i..end].fill(false);
                i = end;
            }
            None => i += 1,
        }
    }
    code
}

// A doubled quote inside the span is an escaped quote, not the end.
fn quote_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn line_comment_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

// PostgreSQL block comments nest.
fn block_comment_end(bytes: &[u8], start: usize) -> usize {
    let mut depth = 1;
    let mut i = start + 2;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

// `$tag$ ... $tag$` with an empty or identifier tag. `$1` is a numbered
// placeholder, and a `$` inside an identifier opens nothing.
fn dollar_quote_end(bytes: &[u8], start: usize) -> Option<usize> {
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    if start > 0 && (is_ident(bytes[start - 1]) || bytes[start - 1] == b'$') {
        return None;
    }
    if bytes.get(start + 1).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut i = start + 1;
    while i < bytes.len() && is_ident(bytes[i]) {
        i += 1;
    }
    if bytes.get(i) != Some(&b'$') {
        return None;
    }

    let tag = &bytes[start..=i];
    let body = i + 1;
    Some(
        bytes[body..]
            .windows(tag.len())
            .position(|window| window == tag)
            .map_or(bytes.len(), |offset| body + offset + tag.len()),
    )
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::db::value::Value;

    #[test]
    fn network_insert_gets_numbered_params_and_returning() {
        let query = Query::new("INSERT INTO admin (username) VALUES (?)").bind("x");

        let sql = translate(&query, Backend::Network);

        assert_eq!(sql, "INSERT INTO admin (username) VALUES ($1) RETURNING id");
        assert_eq!(query.params(), &[Value::Text("x".to_string())]);
    }

    #[test]
    fn embedded_statements_pass_through() {
        let raw = "INSERT OR IGNORE INTO sensor_readings (device_uid, metric, value) VALUES (?, ?, ?);";
        let query = Query::new(raw);

        assert_eq!(translate(&query, Backend::Embedded), raw);
    }

    #[test_case("SELECT * FROM admin WHERE username = ? AND role = ?", "SELECT * FROM admin WHERE username = $1 AND role = $2"; "select")]
    #[test_case("UPDATE admin SET display_name = ? WHERE id = ?;", "UPDATE admin SET display_name = $1 WHERE id = $2"; "update trims semicolon")]
    #[test_case("SELECT * FROM documents WHERE title = 'why?' AND id = ?", "SELECT * FROM documents WHERE title = 'why?' AND id = $1"; "literal question mark")]
    #[test_case("SELECT \"what?\" FROM documents WHERE id = ?", "SELECT \"what?\" FROM documents WHERE id = $1"; "quoted identifier")]
    #[test_case("DELETE FROM documents WHERE id IN (?, ?, ?)", "DELETE FROM documents WHERE id IN ($1, $2, $3)"; "many params")]
    fn network_non_inserts_only_renumber(input: &str, expected: &str) {
        assert_eq!(translate(&Query::new(input), Backend::Network), expected);
    }

    #[test]
    fn insert_or_ignore_without_key_becomes_plain_insert() {
        let query = Query::new("insert or ignore into admin (username, password_hash) values (?, ?)");

        assert_eq!(
            translate(&query, Backend::Network),
            "INSERT into admin (username, password_hash) values ($1, $2) RETURNING id"
        );
    }

    #[test]
    fn declared_conflict_key_is_honoured_on_network() {
        let query = Query::new("INSERT OR IGNORE INTO admin (username) VALUES (?)")
            .ignore_conflicts_on(["username"]);

        assert_eq!(
            translate(&query, Backend::Network),
            "INSERT INTO admin (username) VALUES ($1) ON CONFLICT (username) DO NOTHING RETURNING id"
        );
    }

    #[test]
    fn declared_conflict_key_goes_before_existing_returning() {
        let query = Query::new("INSERT INTO documents (object_key, title) VALUES (?, ?) RETURNING id, created_at")
            .ignore_conflicts_on(["object_key"]);

        assert_eq!(
            translate(&query, Backend::Network),
            "INSERT INTO documents (object_key, title) VALUES ($1, $2) ON CONFLICT (object_key) DO NOTHING RETURNING id, created_at"
        );
    }

    #[test]
    fn existing_returning_is_not_duplicated() {
        let query = Query::new("INSERT INTO admin (username) VALUES (?) RETURNING id");
        assert_eq!(
            translate(&query, Backend::Network),
            "INSERT INTO admin (username) VALUES ($1) RETURNING id"
        );
    }

    #[test]
    fn declared_conflict_key_on_embedded_insert() {
        let query = Query::new("INSERT INTO devices (device_uid) VALUES (?);")
            .ignore_conflicts_on(["device_uid"]);

        assert_eq!(
            translate(&query, Backend::Embedded),
            "INSERT INTO devices (device_uid) VALUES (?) ON CONFLICT (device_uid) DO NOTHING"
        );
    }

    #[test_case(
        "INSERT INTO documents (title, object_key) VALUES ('Returning policy', ?)",
        "INSERT INTO documents (title, object_key) VALUES ('Returning policy', $1) RETURNING id";
        "keyword inside literal"
    )]
    #[test_case(
        "INSERT INTO documents (title, object_key) VALUES (?, ?) -- returning later",
        "INSERT INTO documents (title, object_key) VALUES ($1, $2) -- returning later\nRETURNING id";
        "trailing line comment"
    )]
    #[test_case(
        "INSERT INTO documents (title, object_key) SELECT title, ? FROM (SELECT 'x' AS title RETURNING 1) s",
        "INSERT INTO documents (title, object_key) SELECT title, $1 FROM (SELECT 'x' AS title RETURNING 1) s RETURNING id";
        "nested returning is not top level"
    )]
    fn network_insert_returning_ignores_non_code(input: &str, expected: &str) {
        assert_eq!(translate(&Query::new(input), Backend::Network), expected);
    }

    #[test_case("UPDATE documents SET title = 'returning soon' WHERE object_key = $1"; "update literal")]
    #[test_case("DELETE FROM documents WHERE title = 'Returning policy'"; "delete literal")]
    #[test_case("UPDATE documents SET title = $1 /* RETURNING id */ WHERE id = $2"; "block comment")]
    #[test_case("SELECT \"returning\" FROM documents"; "quoted identifier")]
    fn returning_outside_code_is_not_a_clause(sql: &str) {
        assert!(!has_returning(sql));
    }

    #[test_case(
        "SELECT id FROM documents -- owner?\nWHERE owner_id = ? AND title = ?",
        "SELECT id FROM documents -- owner?\nWHERE owner_id = $1 AND title = $2";
        "line comment"
    )]
    #[test_case(
        "SELECT id /* which one? /* nested? */ still? */ FROM documents WHERE id = ?",
        "SELECT id /* which one? /* nested? */ still? */ FROM documents WHERE id = $1";
        "nested block comment"
    )]
    #[test_case(
        "SELECT $$why?$$ AS note, id FROM documents WHERE id = ?",
        "SELECT $$why?$$ AS note, id FROM documents WHERE id = $1";
        "dollar quoted"
    )]
    #[test_case(
        "SELECT $body$ a ? b $body$, id FROM documents WHERE id = ?",
        "SELECT $body$ a ? b $body$, id FROM documents WHERE id = $1";
        "tagged dollar quoted"
    )]
    #[test_case(
        "SELECT id FROM documents WHERE title = 'it''s ?' AND id = ?",
        "SELECT id FROM documents WHERE title = 'it''s ?' AND id = $1";
        "escaped quote"
    )]
    fn placeholders_in_comments_and_bodies_are_kept(input: &str, expected: &str) {
        assert_eq!(number_placeholders(input), expected);
    }

    #[test]
    fn conflict_key_in_literal_still_gets_clause() {
        let query = Query::new("INSERT INTO documents (title, object_key) VALUES ('on conflict notes', ?)")
            .ignore_conflicts_on(["object_key"]);

        assert_eq!(
            translate(&query, Backend::Network),
            "INSERT INTO documents (title, object_key) VALUES ('on conflict notes', $1) ON CONFLICT (object_key) DO NOTHING RETURNING id"
        );
    }

    #[test]
    fn detects_inserts() {
        assert!(is_insert("  insert into x values (1)"));
        assert!(!is_insert("SELECT 1"));
        assert!(!is_insert("ins"));
        assert!(has_returning("INSERT INTO x VALUES (1) returning id"));
    }
}
