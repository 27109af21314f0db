//! Очистка свободного текста перед отправкой демону.

use serde_json::{Map, Value};

/// Удалить управляющие ASCII-символы (0x00–0x1F, 0x7F).
///
/// Валидность UTF-8 гарантирует сам `&str`: текст из БД и из запросов
/// декодируется в строки до того, как попадает сюда.
pub fn sanitize_text(s: &str) -> String {
    s.chars().filter(|c| !is_ascii_control(*c)).collect()
}

/// Рекурсивно очистить все строки (и ключи объектов) в JSON-значении.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (sanitize_text(&k), sanitize_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Обрезать до `max` символов (не байтов).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn is_ascii_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}')
}
