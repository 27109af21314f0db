//! Точка входа удалённого API Wings.

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use url::Url;
use wings_remote::config::{ServerConfig, TlsMode};

#[derive(Parser)]
#[command(
    name = "wings-remote",
    about = "Удалённый API панели для демонов Wings"
)]
struct Cli {
    /// Адрес для прослушивания (host:port)
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// URL базы данных
    #[arg(
        long,
        default_value = "sqlite:./panel.db?mode=rwc",
        env = "DATABASE_URL"
    )]
    db_url: String,

    /// Публичный адрес панели (для ссылок пагинации)
    #[arg(long, default_value = "http://localhost:8080", env = "PANEL_URL")]
    panel_url: String,

    /// Режим TLS: none, self-signed, cert
    #[arg(long, default_value = "none")]
    tls_mode: String,

    /// Домен для SAN самоподписанного сертификата
    #[arg(long, default_value = "localhost")]
    domain: String,

    /// PEM-сертификат (режим cert)
    #[arg(long, default_value = "/etc/wings-remote/cert.pem")]
    tls_cert: String,

    /// PEM-ключ (режим cert)
    #[arg(long, default_value = "/etc/wings-remote/key.pem")]
    tls_key: String,

    /// Завершать активный импорт по GET-колбэку без статуса
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "WINGS_LENIENT_IMPORT_GET"
    )]
    lenient_import_get: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логгера
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let tls_mode: TlsMode = cli
        .tls_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let panel_url = Url::parse(&cli.panel_url)
        .map_err(|e| anyhow::anyhow!("Некорректный PANEL_URL {}: {e}", cli.panel_url))?;

    let config = ServerConfig {
        listen: cli.listen,
        db_url: cli.db_url,
        panel_url,
        tls_mode,
        domain: cli.domain,
        tls_cert: cli.tls_cert,
        tls_key: cli.tls_key,
        lenient_import_get: cli.lenient_import_get,
    };

    wings_remote::run(config).await
}
