//! Разбор JSON-полей spell.
//!
//! Все поля хранятся как непрозрачный текст. Ошибка разбора или неожиданная форма
//! значения никогда не поднимается наверх: поле сворачивается в `None`, а вызывающий
//! код подставляет значение по умолчанию.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Сообщения о готовности, если у spell нет секции `config_startup` вообще.
pub const DEFAULT_DONE_MESSAGES: [&str; 4] = [
    "Server is ready to accept connections",
    "Server startup complete",
    "Done (",
    "For help, type \"help\"",
];

/// Запросы взаимодействия по умолчанию (та же оговорка, что и для `done`).
pub const DEFAULT_USER_INTERACTION: [&str; 2] = ["Do you accept the EULA?", "Please accept the terms"];

pub const DEFAULT_STOP_COMMAND: &str = "stop";

pub const DEFAULT_CONFIG_PARSER: &str = "properties";

/// Декодировать JSON-колонку в `T`. Пустая колонка, битый JSON или другая форма — `None`.
pub fn parse<T: DeserializeOwned>(raw: Option<&str>) -> Option<T> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    serde_json::from_str(raw).ok()
}

/// `features`: объект или массив, иначе пустой объект.
pub fn features(raw: Option<&str>) -> Value {
    match parse::<Value>(raw) {
        Some(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::Object(Map::new()),
    }
}

/// `file_denylist`: только строковые элементы массива.
pub fn file_denylist(raw: Option<&str>) -> Vec<String> {
    parse::<Vec<Value>>(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Первый пригодный образ из `docker_images`.
///
/// Принимается массив строк и объект «метка → образ» (берётся первое значение
/// в порядке хранения).
pub fn first_docker_image(raw: Option<&str>) -> Option<String> {
    let images: Vec<Value> = match parse::<Value>(raw)? {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => return None,
    };
    images.into_iter().find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Правило переписывания одного конфигурационного файла.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFileRule {
    pub file: String,
    pub parser: String,
    pub replacements: Vec<ReplaceRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceRule {
    pub matcher: String,
    pub if_value: Option<String>,
    /// Сырое значение; строки позже проходят подстановку плейсхолдеров.
    pub replace_with: Value,
}

/// `config_files`: объект `файл → {parser, find}`.
///
/// Записи с нестроковым ключом или необъектным значением пропускаются.
/// Объект в качестве замены трактуется как условная замена: берётся первая пара
/// `условие → значение`.
pub fn config_files(raw: Option<&str>) -> Vec<ConfigFileRule> {
    let Some(files) = parse::<Map<String, Value>>(raw) else {
        return Vec::new();
    };

    files
        .into_iter()
        .filter_map(|(file, entry)| {
            let Value::Object(entry) = entry else {
                return None;
            };
            let parser = entry
                .get("parser")
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_CONFIG_PARSER)
                .to_string();

            let replacements = match entry.get("find") {
                Some(Value::Object(find)) => find
                    .iter()
                    .filter_map(|(matcher, replacement)| replace_rule(matcher, replacement))
                    .collect(),
                _ => Vec::new(),
            };

            Some(ConfigFileRule {
                file,
                parser,
                replacements,
            })
        })
        .collect()
}

fn replace_rule(matcher: &str, replacement: &Value) -> Option<ReplaceRule> {
    match replacement {
        Value::Object(conditional) => {
            let (condition, value) = conditional.iter().next()?;
            Some(ReplaceRule {
                matcher: matcher.to_string(),
                if_value: Some(condition.clone()),
                replace_with: value.clone(),
            })
        }
        other => Some(ReplaceRule {
            matcher: matcher.to_string(),
            if_value: None,
            replace_with: other.clone(),
        }),
    }
}

/// Строки, по которым демон определяет запуск и ожидание ввода.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupDetection {
    pub done: Vec<String>,
    pub user_interaction: Vec<String>,
    pub strip_ansi: bool,
}

/// `config_startup`: `done` и `user_interaction` — строка или массив строк.
///
/// Значения по умолчанию подставляются только когда секции нет совсем.
/// Явный пустой список сохраняется пустым.
pub fn startup_detection(raw: Option<&str>) -> StartupDetection {
    let section_present = raw.is_some_and(|s| !s.trim().is_empty());
    if !section_present {
        return StartupDetection {
            done: DEFAULT_DONE_MESSAGES.iter().map(|s| s.to_string()).collect(),
            user_interaction: DEFAULT_USER_INTERACTION
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strip_ansi: false,
        };
    }

    let section = parse::<Map<String, Value>>(raw).unwrap_or_default();
    StartupDetection {
        done: string_list(section.get("done")),
        user_interaction: string_list(section.get("user_interaction")),
        strip_ansi: section
            .get("strip_ansi")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// `config_logs` демону больше не передаётся, но разбирается для наблюдателей.
pub fn config_logs(raw: Option<&str>) -> Value {
    match parse::<Value>(raw) {
        Some(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::Object(Map::new()),
    }
}

/// Значение директивы остановки: строка или число (например, номер сигнала).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StopValue {
    Text(String),
    Number(Number),
}

/// Как демон должен останавливать сервер.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigStop {
    /// Строка, отправляемая в консоль.
    Command(String),
    /// Явная директива `{type, value}` из spell.
    Signal { kind: String, value: StopValue },
}

/// Форма, в которой директива уходит демону.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopDirective {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: StopValue,
}

impl ConfigStop {
    /// Нормализовать `config_stop`.
    ///
    /// Голая строка (JSON-строка или просто текст) — команда. Объект принимается,
    /// только если `type` строка, а `value` строка или число. Всё остальное — `stop`.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return ConfigStop::default();
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(command)) if !command.is_empty() => ConfigStop::Command(command),
            Ok(Value::Object(directive)) => {
                let kind = directive.get("type").and_then(Value::as_str);
                let value = match directive.get("value") {
                    Some(Value::String(s)) => Some(StopValue::Text(s.clone())),
                    Some(Value::Number(n)) => Some(StopValue::Number(n.clone())),
                    _ => None,
                };
                match (kind, value) {
                    (Some(kind), Some(value)) => ConfigStop::Signal {
                        kind: kind.to_string(),
                        value,
                    },
                    _ => ConfigStop::default(),
                }
            }
            Ok(_) => ConfigStop::default(),
            Err(_) => ConfigStop::Command(raw.to_string()),
        }
    }

    pub fn into_directive(self) -> StopDirective {
        match self {
            ConfigStop::Command(command) => StopDirective {
                kind: "command".to_string(),
                value: StopValue::Text(command),
            },
            ConfigStop::Signal { kind, value } => StopDirective { kind, value },
        }
    }
}

impl Default for ConfigStop {
    fn default() -> Self {
        ConfigStop::Command(DEFAULT_STOP_COMMAND.to_string())
    }
}
