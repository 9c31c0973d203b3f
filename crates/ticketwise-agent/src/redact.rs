//! Scrub credentials from technical messages before they are stored or logged.

use std::sync::LazyLock;

use regex::Regex;

const MASK: &str = "[REDACTED]";

/// Shortest registered secret we will search for; shorter values would
/// mangle ordinary text.
const MIN_SECRET_LEN: usize = 4;

static AUTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]+").expect("auth header pattern compiles")
});

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(api[_-]?key|access[_-]?token|token|password|passwd|secret)(["']?\s*[:=]\s*["']?)[^\s"',;&]+"#)
        .expect("key/value pattern compiles")
});

static SK_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsk-[A-Za-z0-9_-]{8,}").expect("sk key pattern compiles"));

static URL_USERINFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z][a-z0-9+.-]*://)[^/\s@]+@").expect("url userinfo pattern compiles")
});

/// Redacts known credential shapes plus any registered secret values.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also scrub this exact value wherever it appears.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.register(secret);
        self
    }

    pub fn register(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.len() >= MIN_SECRET_LEN && !self.secrets.contains(&secret) {
            self.secrets.push(secret);
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), MASK);
            }
        }
        let out = AUTH_HEADER.replace_all(&out, format!("$1 {}", MASK));
        let out = KEY_VALUE.replace_all(&out, format!("$1$2{}", MASK));
        let out = SK_KEY.replace_all(&out, format!("sk-{}", MASK));
        let out = URL_USERINFO.replace_all(&out, format!("$1{}@", MASK));
        out.into_owned()
    }
}
