//! Приём соединений демонов: без TLS, с самоподписанным сертификатом или с PEM-файлами.

use crate::config::{ServerConfig, TlsMode};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Период перечитывания PEM-файлов в режиме `cert`.
const CERT_RELOAD_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Сколько ждать незавершённые запросы при остановке.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Запустить сервер в нужном TLS-режиме.
pub async fn serve(
    config: &ServerConfig,
    app: Router,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen.parse()?;
    match &config.tls_mode {
        TlsMode::None => serve_plain(addr, app, shutdown_rx).await,
        TlsMode::SelfSigned => {
            info!("Запуск HTTPS на {addr} (самоподписанный сертификат для {})", config.domain);
            let rustls = self_signed(&config.domain).await?;
            serve_rustls(addr, app, rustls, shutdown_rx).await
        }
        TlsMode::Cert => {
            info!(
                "Запуск HTTPS на {addr} (сертификат: {}, ключ: {})",
                config.tls_cert, config.tls_key
            );
            let rustls = RustlsConfig::from_pem_file(&config.tls_cert, &config.tls_key).await?;
            spawn_cert_reload(rustls.clone(), config.tls_cert.clone(), config.tls_key.clone());
            serve_rustls(addr, app, rustls, shutdown_rx).await
        }
    }
}

async fn serve_plain(
    addr: SocketAddr,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Запуск HTTP на {addr} (без TLS)");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown_rx).await })
        .await?;
    Ok(())
}

async fn serve_rustls(
    addr: SocketAddr,
    app: Router,
    rustls: RustlsConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        wait_for_shutdown(&mut shutdown_rx).await;
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn self_signed(domain: &str) -> anyhow::Result<RustlsConfig> {
    let subject_alt_names = vec![domain.to_string(), "localhost".to_string()];
    let certified_key = rcgen::generate_simple_self_signed(subject_alt_names)
        .map_err(|e| anyhow::anyhow!("Ошибка генерации сертификата: {e}"))?;

    let cert_pem = certified_key.cert.pem();
    let key_pem = certified_key.signing_key.serialize_pem();
    Ok(RustlsConfig::from_pem(cert_pem.into_bytes(), key_pem.into_bytes()).await?)
}

/// Перечитывать сертификаты по расписанию (их обновляет внешний ACME-клиент).
fn spawn_cert_reload(rustls: RustlsConfig, cert_path: String, key_path: String) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CERT_RELOAD_INTERVAL);
        interval.tick().await; // первый тик срабатывает сразу
        loop {
            interval.tick().await;
            match rustls.reload_from_pem_file(&cert_path, &key_path).await {
                Ok(()) => info!("TLS сертификаты перезагружены"),
                Err(e) => tracing::error!("Ошибка перезагрузки TLS сертификатов: {e}"),
            }
        }
    });
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
}
