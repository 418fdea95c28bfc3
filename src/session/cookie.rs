use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use thiserror::Error;

use crate::config::SessionConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("session secret cannot key HMAC-SHA256")]
pub struct InvalidSecret;

/// What the request's cookie header says about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCookie {
    Absent,
    /// A session cookie was sent but its signature did not verify.
    Invalid,
    Valid(String),
}

/// Name, attributes and signing key of the session cookie.
///
/// The cookie value is `<id>.<hex hmac-sha256(id)>`; only the id means
/// anything to the server.
#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    mac: HmacSha256,
    max_age_secs: u64,
    secure: bool,
}

impl SessionCookie {
    pub fn new(config: &SessionConfig) -> Result<Self, InvalidSecret> {
        let name: String = config.cookie_name.chars().filter(|c| is_token_char(*c)).collect();
        Ok(Self {
            name: if name.is_empty() { "portal.sid".to_string() } else { name },
            mac: HmacSha256::new_from_slice(config.secret.as_bytes()).map_err(|_| InvalidSecret)?,
            max_age_secs: config.ttl_secs,
            secure: config.secure_cookie,
        })
    }

    pub(crate) fn set_max_age(&mut self, secs: u64) {
        self.max_age_secs = secs;
    }

    pub fn sign(&self, id: &str) -> String {
        format!("{}.{}", id, hex::encode(self.mac(id).finalize().into_bytes()))
    }

    /// Extract and verify the session id from the request headers.
    pub fn read(&self, headers: &HeaderMap) -> PresentedCookie {
        let mut presented = PresentedCookie::Absent;
        for value in cookie_values(headers, &self.name) {
            match self.verify(value) {
                Some(id) => return PresentedCookie::Valid(id.to_string()),
                None => presented = PresentedCookie::Invalid,
            }
        }
        presented
    }

    /// `Set-Cookie` value carrying the signed id.
    pub fn issue(&self, id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.attributes(&self.sign(id), self.max_age_secs))
    }

    /// `Set-Cookie` value that makes the browser drop the cookie.
    pub fn clear(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.attributes("", 0))
    }

    fn attributes(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (id, signature) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        self.mac(id).verify_slice(&signature).ok().map(|()| id)
    }

    fn mac(&self, id: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac
    }
}

fn cookie_values<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(move |pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.trim_matches('"'))
        })
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn cookie() -> SessionCookie {
        SessionCookie::new(&AppConfig::development().session).unwrap()
    }

    fn headers_with(cookie_header: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie_header).unwrap());
        headers
    }

    #[test]
    fn signature_is_hex_hmac_sha256_of_the_id() {
        let mut config = AppConfig::development().session;
        config.secret = "Jefe".to_string();
        let signed = SessionCookie::new(&config).unwrap().sign("what do ya want for nothing?");
        assert_eq!(
            signed,
            "what do ya want for nothing?.5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn non_hex_signature_is_invalid() {
        assert_eq!(cookie().read(&headers_with("portal.sid=abc123.not-hex")), PresentedCookie::Invalid);
    }

    #[test]
    fn signed_value_reads_back() {
        let cookie = cookie();
        let header = format!("theme=dark; portal.sid={}", cookie.sign("abc123"));
        assert_eq!(cookie.read(&headers_with(&header)), PresentedCookie::Valid("abc123".to_string()));
    }

    #[test]
    fn tampered_or_foreign_values_are_invalid() {
        let cookie = cookie();
        let signed = cookie.sign("abc123");
        let tampered = signed.replacen("abc123", "abc124", 1);
        assert_eq!(
            cookie.read(&headers_with(&format!("portal.sid={}", tampered))),
            PresentedCookie::Invalid
        );
        assert_eq!(cookie.read(&headers_with("portal.sid=abc123")), PresentedCookie::Invalid);

        let mut other = AppConfig::development().session;
        other.secret = "another-secret".to_string();
        let foreign = SessionCookie::new(&other).unwrap().sign("abc123");
        assert_eq!(
            cookie.read(&headers_with(&format!("portal.sid={}", foreign))),
            PresentedCookie::Invalid
        );
    }

    #[test]
    fn missing_cookie_is_absent() {
        assert_eq!(cookie().read(&HeaderMap::new()), PresentedCookie::Absent);
        assert_eq!(cookie().read(&headers_with("theme=dark")), PresentedCookie::Absent);
    }

    #[test]
    fn issued_cookie_is_http_only_with_max_age() {
        let value = cookie().issue("abc123").unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("portal.sid=abc123."));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=3600"));
        assert!(!value.contains("Secure"));

        let cleared = cookie().clear().unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }
}
