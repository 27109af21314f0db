//! Дескриптор сервера: JSON-конфигурация, по которой демон создаёт и запускает контейнер.
//!
//! Построение работает только с уже загруженным [`ServerContext`] и не читает часы,
//! поэтому одинаковый контекст даёт побайтно одинаковый JSON.

use crate::error::AppError;
use crate::services::catalog::ServerContext;
use crate::services::sanitize::{sanitize_text, sanitize_value};
use crate::services::spell_config::{self, ConfigStop, StartupDetection, StopDirective};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Жёсткий потолок размера закодированного дескриптора.
pub const MAX_DESCRIPTOR_BYTES: usize = 1024 * 1024;

/// Команда запуска, если её не задали ни spell, ни сервер.
pub const DEFAULT_STARTUP: &str = "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar {{SERVER_JARFILE}}";

/// Память для подстановок при `memory = 0` (без ограничения): `-Xmx0M` Java не примет.
pub const UNLIMITED_MEMORY_FALLBACK: i64 = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerDescriptor {
    pub settings: Settings,
    pub process_configuration: ProcessConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub uuid: String,
    pub meta: Meta,
    pub suspended: bool,
    pub invocation: String,
    pub skip_egg_scripts: bool,
    pub environment: BTreeMap<String, EnvValue>,
    pub allocations: AllocationSettings,
    pub build: BuildLimits,
    pub mounts: Vec<Value>,
    pub egg: EggSettings,
    pub container: ContainerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub name: String,
    pub description: String,
}

/// Значение переменной окружения: встроенные числовые переменные уходят числами.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Text(String),
    Number(i64),
}

impl EnvValue {
    fn as_placeholder(&self) -> String {
        match self {
            EnvValue::Text(s) => s.clone(),
            EnvValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSettings {
    pub force_outgoing_ip: bool,
    pub default: DefaultAllocation,
    /// ip → порты
    pub mappings: BTreeMap<String, Vec<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultAllocation {
    pub ip: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildLimits {
    pub memory_limit: i64,
    pub swap: i64,
    pub io_weight: i32,
    pub cpu_limit: i32,
    pub disk_space: i64,
    pub threads: Option<String>,
    pub oom_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EggSettings {
    pub id: String,
    pub file_denylist: Vec<String>,
    pub features: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSettings {
    pub image: String,
    pub oom_disabled: bool,
    pub requires_rebuild: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessConfiguration {
    pub configs: Vec<ConfigFile>,
    pub startup: StartupDetection,
    pub stop: StopDirective,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigFile {
    pub file: String,
    pub parser: String,
    pub replace: Vec<Replacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replacement {
    #[serde(rename = "match")]
    pub matcher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_value: Option<String>,
    pub replace_with: Value,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to encode JSON configuration: {0}")]
    Encode(serde_json::Error),

    #[error("response too large: {0} bytes")]
    TooLarge(usize),

    #[error("JSON validation failed after encoding: {0}")]
    Roundtrip(serde_json::Error),
}

impl From<DescriptorError> for AppError {
    fn from(e: DescriptorError) -> Self {
        AppError::ConfigBuild(e.to_string())
    }
}

/// Собрать дескриптор сервера.
pub fn build(ctx: &ServerContext) -> ServerDescriptor {
    let server = &ctx.server;
    let spell = &ctx.spell;
    let environment = environment(ctx);

    let template = non_blank(spell.startup.as_deref())
        .or_else(|| non_blank(server.startup.as_deref()))
        .unwrap_or(DEFAULT_STARTUP);
    let invocation = render_placeholders(template, ctx, &environment);
    let invocation = sanitize_text(&sanitize_java_memory(&invocation, server.memory));

    let image = spell_config::first_docker_image(spell.docker_images.as_deref())
        .unwrap_or_else(|| server.image.clone());

    let configs = spell_config::config_files(spell.config_files.as_deref())
        .into_iter()
        .map(|rule| ConfigFile {
            file: sanitize_text(&rule.file),
            parser: sanitize_text(&rule.parser),
            replace: rule
                .replacements
                .into_iter()
                .map(|r| Replacement {
                    matcher: sanitize_text(&r.matcher),
                    if_value: r.if_value.as_deref().map(sanitize_text),
                    replace_with: match r.replace_with {
                        Value::String(s) => Value::String(sanitize_text(&render_placeholders(
                            &s,
                            ctx,
                            &environment,
                        ))),
                        other => sanitize_value(other),
                    },
                })
                .collect(),
        })
        .collect();

    let startup = spell_config::startup_detection(spell.config_startup.as_deref());
    let startup = StartupDetection {
        done: startup.done.iter().map(|s| sanitize_text(s)).collect(),
        user_interaction: startup
            .user_interaction
            .iter()
            .map(|s| sanitize_text(s))
            .collect(),
        strip_ansi: startup.strip_ansi,
    };

    let stop = match ConfigStop::parse(spell.config_stop.as_deref()) {
        ConfigStop::Command(command) => ConfigStop::Command(sanitize_text(&command)),
        ConfigStop::Signal { kind, value } => ConfigStop::Signal {
            kind: sanitize_text(&kind),
            value,
        },
    };

    ServerDescriptor {
        settings: Settings {
            uuid: server.uuid.clone(),
            meta: Meta {
                name: sanitize_text(&server.name),
                description: sanitize_text(server.description.as_deref().unwrap_or_default()),
            },
            suspended: server.status == "suspended",
            invocation,
            skip_egg_scripts: server.skip_scripts,
            environment,
            allocations: AllocationSettings {
                force_outgoing_ip: spell.force_outgoing_ip,
                default: DefaultAllocation {
                    ip: sanitize_text(&ctx.allocation.ip),
                    port: ctx.allocation.port,
                },
                mappings: allocation_mappings(ctx),
            },
            build: BuildLimits {
                memory_limit: server.memory,
                swap: server.swap,
                io_weight: server.io,
                cpu_limit: server.cpu,
                disk_space: server.disk,
                threads: server.threads.as_deref().map(sanitize_text),
                oom_disabled: server.oom_disabled,
            },
            mounts: Vec::new(),
            egg: EggSettings {
                id: sanitize_text(&spell.uuid),
                file_denylist: spell_config::file_denylist(spell.file_denylist.as_deref())
                    .iter()
                    .map(|s| sanitize_text(s))
                    .collect(),
                features: sanitize_value(spell_config::features(spell.features.as_deref())),
            },
            container: ContainerSettings {
                image: sanitize_text(&image),
                oom_disabled: server.oom_disabled,
                requires_rebuild: false,
            },
        },
        process_configuration: ProcessConfiguration {
            configs,
            startup,
            stop: stop.into_directive(),
        },
    }
}

/// Закодировать дескриптор и проверить результат целиком:
/// кодирование → потолок размера → повторное декодирование.
pub fn encode(descriptor: &ServerDescriptor) -> Result<Vec<u8>, DescriptorError> {
    let bytes = serde_json::to_vec(descriptor).map_err(DescriptorError::Encode)?;
    if bytes.len() > MAX_DESCRIPTOR_BYTES {
        return Err(DescriptorError::TooLarge(bytes.len()));
    }
    serde_json::from_slice::<Value>(&bytes).map_err(DescriptorError::Roundtrip)?;
    Ok(bytes)
}

/// Память для подстановок и `SERVER_MEMORY`.
pub fn placeholder_memory(memory: i64) -> i64 {
    if memory > 0 {
        memory
    } else {
        UNLIMITED_MEMORY_FALLBACK
    }
}

/// Переменные spell со значениями сервера, затем встроенные переменные панели.
pub fn environment(ctx: &ServerContext) -> BTreeMap<String, EnvValue> {
    let mut env: BTreeMap<String, EnvValue> = ctx
        .variables
        .iter()
        .filter(|v| !v.env_variable.trim().is_empty())
        .map(|v| {
            (
                sanitize_text(&v.env_variable),
                EnvValue::Text(sanitize_text(&v.value)),
            )
        })
        .collect();

    env.insert(
        "P_SERVER_LOCATION".to_string(),
        EnvValue::Text(
            ctx.node
                .location_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ),
    );
    env.insert(
        "P_SERVER_UUID".to_string(),
        EnvValue::Text(ctx.server.uuid.clone()),
    );
    env.insert(
        "P_SERVER_ALLOCATION_LIMIT".to_string(),
        EnvValue::Number(i64::from(ctx.server.allocation_limit.unwrap_or(0))),
    );
    env.insert(
        "SERVER_MEMORY".to_string(),
        EnvValue::Number(placeholder_memory(ctx.server.memory)),
    );
    env.insert(
        "SERVER_IP".to_string(),
        EnvValue::Text(sanitize_text(&ctx.allocation.ip)),
    );
    env.insert(
        "SERVER_PORT".to_string(),
        EnvValue::Number(i64::from(ctx.allocation.port)),
    );
    env
}

/// Подставить плейсхолдеры панели. Неизвестные плейсхолдеры остаются демону.
pub fn render_placeholders(
    value: &str,
    ctx: &ServerContext,
    environment: &BTreeMap<String, EnvValue>,
) -> String {
    let port = ctx.allocation.port.to_string();
    let ip = ctx.allocation.ip.as_str();
    let memory = placeholder_memory(ctx.server.memory).to_string();

    let fixed = [
        ("{{server.build.default.port}}", port.as_str()),
        ("{{server.build.default.ip}}", ip),
        ("{{server.build.memory}}", memory.as_str()),
        ("{{server.build.env.SERVER_PORT}}", port.as_str()),
        ("{{env.SERVER_PORT}}", port.as_str()),
        ("{{server.build.env.SERVER_IP}}", ip),
        ("{{env.SERVER_IP}}", ip),
        ("{{server.build.env.SERVER_MEMORY}}", memory.as_str()),
        ("{{env.SERVER_MEMORY}}", memory.as_str()),
    ];

    let mut out = value.to_string();
    for (placeholder, replacement) in fixed {
        if out.contains(placeholder) {
            out = out.replace(placeholder, replacement);
        }
    }

    for (key, env_value) in environment {
        let env_value = env_value.as_placeholder();
        for placeholder in [
            format!("{{{{server.build.env.{key}}}}}"),
            format!("{{{{env.{key}}}}}"),
        ] {
            if out.contains(&placeholder) {
                out = out.replace(&placeholder, &env_value);
            }
        }
    }

    // Старое имя; подставляет сам демон
    out.replace(
        "{{config.docker.interface}}",
        "{{config.docker.network.interface}}",
    )
}

/// Починить нулевые аргументы памяти Java (`-Xmx0M`, `-Xms0`).
///
/// `-Xmx0` при известной памяти сервера заменяется на неё в той же единице,
/// остальные нулевые аргументы удаляются. Пробелы схлопываются.
pub fn sanitize_java_memory(command: &str, server_memory: i64) -> String {
    command
        .split_whitespace()
        .filter_map(|token| match java_memory_arg(token) {
            Some((flag, 0, unit)) => {
                if flag == "-Xmx" && server_memory > 0 {
                    Some(format!(
                        "{flag}{}{unit}",
                        memory_in_unit(server_memory, unit)
                    ))
                } else {
                    None
                }
            }
            _ => Some(token.to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Разобрать `-Xmx<число>[kmgt]` / `-Xms<число>[kmgt]`.
fn java_memory_arg(token: &str) -> Option<(&str, u64, &str)> {
    let flag = ["-Xmx", "-Xms"]
        .into_iter()
        .find(|flag| token.starts_with(flag))?;
    let rest = &token[flag.len()..];
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, unit) = rest.split_at(digits_end);
    if digits.is_empty() {
        return None;
    }
    if !(unit.is_empty() || (unit.len() == 1 && "kKmMgGtT".contains(unit))) {
        return None;
    }
    let value = digits.parse::<u64>().ok()?;
    Some((flag, value, unit))
}

fn memory_in_unit(memory_mb: i64, unit: &str) -> i64 {
    match unit {
        "k" | "K" => memory_mb.saturating_mul(1024),
        "g" | "G" => (memory_mb / 1024).max(1),
        "t" | "T" => (memory_mb / (1024 * 1024)).max(1),
        _ => memory_mb,
    }
}

/// Пары ip:port сервера, сгруппированные по ip. Основная пара есть всегда.
fn allocation_mappings(ctx: &ServerContext) -> BTreeMap<String, Vec<i32>> {
    let mut mappings: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for allocation in &ctx.allocations {
        mappings
            .entry(sanitize_text(&allocation.ip))
            .or_default()
            .push(allocation.port);
    }

    let default_ports = mappings
        .entry(sanitize_text(&ctx.allocation.ip))
        .or_default();
    if !default_ports.contains(&ctx.allocation.port) {
        default_ports.insert(0, ctx.allocation.port);
    }
    mappings
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
