//! Deterministic Lua-table serializer.

use super::{Key, SettingsBlob, Table, Value};
use std::fmt::Write;

/// First line of every sidecar file.
pub const MARKER_COMMENT: &str = "-- we can read Lua syntax here!";

const INDENT: &str = "    ";

/// Serialize a blob into complete sidecar file text.
pub fn encode(blob: &SettingsBlob) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(MARKER_COMMENT);
    out.push_str("\nreturn ");
    write_table(&mut out, blob.table(), 0);
    out.push('\n');
    out
}

fn write_table_entries<'a>(
    out: &mut String,
    entries: impl Iterator<Item = (Key, &'a Value)>,
    depth: usize,
) {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for (key, value) in entries {
        push_indent(out, depth + 1);
        out.push('[');
        match key {
            Key::Index(i) => {
                let _ = write!(out, "{}", i);
            }
            Key::Name(name) => write_string(out, &name),
        }
        out.push_str("] = ");
        write_value(out, value, depth + 1);
        out.push_str(",\n");
    }
    push_indent(out, depth);
    out.push('}');
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Number(n) => write_number(out, *n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => write_table_entries(
            out,
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (Key::Index(i as i64 + 1), v)),
            depth,
        ),
        Value::Table(table) => write_table(out, table, depth),
    }
}

fn write_table(out: &mut String, table: &Table, depth: usize) {
    write_table_entries(out, table.iter().map(|(k, v)| (k.clone(), v)), depth);
}

/// Floats always carry a marker that keeps them floats when read back.
fn write_number(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("0/0");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "math.huge" } else { "-math.huge" });
    } else {
        // `{:?}` is the shortest representation that round-trips and always
        // includes a '.' or an exponent.
        let _ = write!(out, "{:?}", n);
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                // Three digits so a following digit is not swallowed.
                let _ = write!(out, "\\{:03}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut blob = SettingsBlob::new();
        blob.set("doc_path", "/books/novel.epub");
        blob.set("page", 42);
        blob.set("percent_finished", 0.25);
        blob.set("tags", vec![Value::from("a"), Value::from("b")]);

        let text = encode(&blob);
        assert_eq!(
            text,
            "-- we can read Lua syntax here!\n\
             return {\n\
             \x20   [\"doc_path\"] = \"/books/novel.epub\",\n\
             \x20   [\"page\"] = 42,\n\
             \x20   [\"percent_finished\"] = 0.25,\n\
             \x20   [\"tags\"] = {\n\
             \x20       [1] = \"a\",\n\
             \x20       [2] = \"b\",\n\
             \x20   },\n\
             }\n"
        );
    }

    #[test]
    fn test_encode_empty_table() {
        let text = encode(&SettingsBlob::new());
        assert!(text.ends_with("return {}\n"));
    }

    #[test]
    fn test_float_keeps_fraction_marker() {
        let mut out = String::new();
        write_number(&mut out, 3.0);
        assert_eq!(out, "3.0");

        let mut out = String::new();
        write_number(&mut out, f64::NEG_INFINITY);
        assert_eq!(out, "-math.huge");
    }

    #[test]
    fn test_string_escapes() {
        let mut out = String::new();
        write_string(&mut out, "a\"b\\c\nd\u{1}9é");
        assert_eq!(out, "\"a\\\"b\\\\c\\nd\\0019é\"");
    }
}
