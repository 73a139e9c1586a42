//! Small lookup helpers shared by the site parsers.
//!
//! Multi-class lookups use `[class="a b c"]` so the match is on the exact class
//! attribute, the way the sites ship it.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

pub fn select<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    doc.select(&sel).next()
}

pub fn first_in<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    el.select(&sel).next()
}

pub fn select_in<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => el.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// All descendant text, trimmed.
pub fn text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match, `None` when absent or blank.
pub fn first_text(doc: &Html, css: &str) -> Option<String> {
    first(doc, css).map(text).filter(|t| !t.is_empty())
}

pub fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value().attr(name).map(|v| v.trim().to_string())
}

/// `content` of `<meta property="...">`.
pub fn meta_property(doc: &Html, property: &str) -> Option<String> {
    first(doc, &format!(r#"meta[property="{}"]"#, property))
        .and_then(|m| attr(m, "content"))
        .filter(|c| !c.is_empty())
}

/// First element named `tag` whose trimmed text equals `label`.
pub fn find_by_text<'a>(doc: &'a Html, tag: &str, label: &str) -> Option<ElementRef<'a>> {
    select(doc, tag).into_iter().find(|e| text(*e) == label)
}

/// Next sibling element named `tag`.
pub fn next_sibling<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == tag)
}

/// Value cell of a `<th>label</th><td>value</td>` attribute table row.
pub fn table_value(doc: &Html, label: &str) -> Option<String> {
    find_by_text(doc, "th", label)
        .and_then(|th| next_sibling(th, "td"))
        .map(text)
        .filter(|t| !t.is_empty())
}

/// Parsed body of the first `<script>` matching `css`.
pub fn script_json(doc: &Html, css: &str) -> Option<Value> {
    let script = first(doc, css)?;
    let body: String = script.text().collect();
    serde_json::from_str(body.trim()).ok()
}

/// Walk a JSON path of object keys.
pub fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

/// String or number as text; null, empty and other shapes as `None`.
pub fn json_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Booleans the way the shops encode them: JSON bools, 0/1, or yes/no words.
pub fn json_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "si" | "sí" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// First integer in `s`, ignoring thousands dots.
pub fn first_int(s: &str) -> Option<i64> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Text after the first `:` in strings like `Stock: 3`.
pub fn after_colon(s: &str) -> Option<String> {
    s.split_once(':')
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
