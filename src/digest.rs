//! HTTP Digest authentication (RFC 2617 / RFC 7616, MD5 only).

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Md5,
    Md5Sess,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Challenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    qop_auth: bool,
    algorithm: Algorithm,
}

impl Challenge {
    /// Parse a `WWW-Authenticate` header value. Returns `None` for non-Digest
    /// schemes and for algorithms other than MD5/MD5-sess.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop_auth = false;
        let mut algorithm = Algorithm::Md5;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop_auth = value.split(',').any(|q| q.trim() == "auth"),
                "algorithm" => {
                    algorithm = match value.to_ascii_uppercase().as_str() {
                        "MD5" => Algorithm::Md5,
                        "MD5-SESS" => Algorithm::Md5Sess,
                        _ => return None,
                    }
                }
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            opaque,
            qop_auth,
            algorithm,
        })
    }
}

fn split_params(s: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| *c == ',' || c.is_whitespace()) {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next().is_none() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        out.push((key.trim().to_string(), value.trim().to_string()));
    }
    out
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Credentials plus the last challenge seen, so later requests can be
/// authorised without another 401 round trip.
#[derive(Debug, Clone)]
pub(crate) struct DigestAuth {
    username: String,
    password: String,
    challenge: Option<Challenge>,
    nonce_count: u32,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            challenge: None,
            nonce_count: 0,
        }
    }

    pub fn set_challenge(&mut self, challenge: Challenge) {
        self.challenge = Some(challenge);
        self.nonce_count = 0;
    }

    pub fn clear_challenge(&mut self) {
        self.challenge = None;
    }

    /// `Authorization` header value for the cached challenge, if any.
    pub fn authorization(&mut self, method: &str, uri: &str) -> Option<String> {
        let cnonce = Uuid::new_v4().simple().to_string();
        self.authorization_with_cnonce(method, uri, &cnonce)
    }

    fn authorization_with_cnonce(&mut self, method: &str, uri: &str, cnonce: &str) -> Option<String> {
        let challenge = self.challenge.as_ref()?;
        self.nonce_count += 1;
        let nc = format!("{:08x}", self.nonce_count);

        let mut ha1 = md5_hex(&format!("{}:{}:{}", self.username, challenge.realm, self.password));
        if challenge.algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", challenge.nonce));
        }
        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let response = if challenge.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", challenge.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce))
        };

        let algorithm = match challenge.algorithm {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        };
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", algorithm={algorithm}, response=\"{response}\"",
            self.username, challenge.realm, challenge.nonce
        );
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        if challenge.qop_auth {
            header.push_str(&format!(", qop=auth, nc={nc}, cnonce=\"{cnonce}\""));
        }
        Some(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn parse_rfc2617_challenge() {
        let c = Challenge::parse(RFC_CHALLENGE).unwrap();
        assert_eq!(c.realm, "testrealm@host.com");
        assert_eq!(c.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(c.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert!(c.qop_auth);
        assert_eq!(c.algorithm, Algorithm::Md5);
    }

    #[test]
    fn parse_rejects_basic_and_unknown_algorithms() {
        assert!(Challenge::parse(r#"Basic realm="x""#).is_none());
        assert!(Challenge::parse(r#"Digest realm="x", nonce="n", algorithm=SHA-256"#).is_none());
        assert!(Challenge::parse(r#"Digest realm="x""#).is_none());
    }

    #[test]
    fn rfc2617_response_matches() {
        let mut auth = DigestAuth::new("Mufasa", "Circle Of Life");
        auth.set_challenge(Challenge::parse(RFC_CHALLENGE).unwrap());
        let header = auth
            .authorization_with_cnonce("GET", "/dir/index.html", "0a4f113b")
            .unwrap();
        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#), "{header}");
        assert!(header.contains("nc=00000001"));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
    }

    #[test]
    fn nonce_count_increments_until_new_challenge() {
        let mut auth = DigestAuth::new("u", "p");
        auth.set_challenge(Challenge::parse(RFC_CHALLENGE).unwrap());
        auth.authorization("GET", "/").unwrap();
        let second = auth.authorization("GET", "/").unwrap();
        assert!(second.contains("nc=00000002"));

        auth.set_challenge(Challenge::parse(RFC_CHALLENGE).unwrap());
        let fresh = auth.authorization("GET", "/").unwrap();
        assert!(fresh.contains("nc=00000001"));
    }

    #[test]
    fn no_header_without_challenge() {
        let mut auth = DigestAuth::new("u", "p");
        assert!(auth.authorization("GET", "/").is_none());
    }
}
