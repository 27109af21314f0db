//! Конфигурация удалённого API Wings.

use url::Url;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Адрес для прослушивания (например "0.0.0.0:8443")
    pub listen: String,

    /// URL подключения к БД (sqlite или postgres)
    pub db_url: String,

    /// Публичный адрес панели; из него строятся ссылки пагинации
    pub panel_url: Url,

    /// Режим TLS
    pub tls_mode: TlsMode,

    /// Домен для SAN самоподписанного сертификата
    pub domain: String,

    /// PEM-сертификат для режима `cert`
    pub tls_cert: String,

    /// PEM-ключ для режима `cert`
    pub tls_key: String,

    /// Разрешить эвристику GET-колбэка импорта без статуса
    pub lenient_import_get: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    None,
    SelfSigned,
    Cert,
}

impl std::str::FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TlsMode::None),
            "self-signed" | "selfsigned" => Ok(TlsMode::SelfSigned),
            "cert" | "pem" => Ok(TlsMode::Cert),
            other => Err(format!(
                "Неизвестный режим TLS: {other}. Допустимые: none, self-signed, cert"
            )),
        }
    }
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::None => write!(f, "none"),
            TlsMode::SelfSigned => write!(f, "self-signed"),
            TlsMode::Cert => write!(f, "cert"),
        }
    }
}
