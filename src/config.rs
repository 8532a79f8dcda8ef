use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base of the URLs handed back for uploaded media.
    pub public_url: String,
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub session_cookie: String,
    /// Platform base domain. `None` disables tenant routing entirely.
    pub root_domain: Option<String>,
    pub billing_webhook_secret: String,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "portfolio-engine".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "portfolio-engine-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let raw_root = std::env::var("ROOT_DOMAIN").unwrap_or_else(|_| "localhost:3000".into());
        let root_domain = normalize_root_domain(&raw_root);
        if root_domain.is_none() {
            tracing::warn!(root_domain = %raw_root, "ROOT_DOMAIN is not a usable host; tenant routing disabled");
        }

        let endpoint = std::env::var("STORAGE_ENDPOINT")?;
        let bucket = std::env::var("STORAGE_BUCKET")?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            upload_timeout_secs: env_parse("UPLOAD_TIMEOUT_SECS", 20),
            endpoint,
            bucket,
        };

        let ai = AiConfig {
            api_key: std::env::var("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into()),
            timeout_secs: env_parse("AI_TIMEOUT_SECS", 30),
        };

        let admin_emails = std::env::var("ADMIN_EMAILS")
            .map(|v| parse_email_list(&v))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt,
            session_cookie: std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "pe_session".into()),
            root_domain,
            billing_webhook_secret: std::env::var("BILLING_WEBHOOK_SECRET")?,
            storage,
            ai,
            admin_emails,
        })
    }

    /// Public address of a tenant page, e.g. `https://alice.example.com/`.
    /// True only for an email named in `ADMIN_EMAILS`.
    pub fn lists_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a == email)
    }

    pub fn tenant_url(&self, subdomain: &str) -> String {
        match &self.root_domain {
            Some(root) => format!("https://{}.{}/", subdomain, root),
            None => format!("/portfolio/{}", subdomain),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercases the configured root domain and rejects values that cannot be a
/// host (empty, whitespace, scheme or path characters). The port is kept: it is
/// part of the public URL and stripped again at comparison time.
pub fn normalize_root_domain(raw: &str) -> Option<String> {
    let value = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let (host, port) = match value.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (value.as_str(), None),
    };
    let port_ok = port.map_or(true, |p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    let valid = port_ok
        && !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !host.starts_with('.')
        && !host.contains("..");
    valid.then_some(value)
}
