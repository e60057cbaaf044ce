//! Session handling: the credential codec behind the session cookie, the
//! cookie itself, and the password generator offered when creating accounts.
//!
//! The token is base64(JSON) and is NOT encrypted. Confidentiality rests on the
//! cookie flags (HttpOnly, SameSite=Strict, Secure in production).

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;
use time::Duration;

use crate::models::ConnectionCredentials;

pub const SESSION_COOKIE: &str = "mongodb_auth";
pub const SESSION_MAX_AGE: Duration = Duration::hours(8);

/// Callers treat this exactly like "no session".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("session absent or malformed")]
pub struct AbsentOrMalformed;

pub fn encode_session(credentials: &ConnectionCredentials) -> String {
    // Serializing a struct of strings cannot fail
    let json = serde_json::to_vec(credentials).unwrap_or_default();
    STANDARD.encode(json)
}

pub fn decode_session(token: &str) -> Result<ConnectionCredentials, AbsentOrMalformed> {
    let bytes = STANDARD.decode(token.trim()).map_err(|_| AbsentOrMalformed)?;
    let credentials: ConnectionCredentials =
        serde_json::from_slice(&bytes).map_err(|_| AbsentOrMalformed)?;
    credentials.validate().map_err(|_| AbsentOrMalformed)?;
    Ok(credentials)
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(SESSION_MAX_AGE)
        .build()
}

/// Stores the credentials in the jar. Only call after connect + ping succeeded.
pub fn login(jar: CookieJar, credentials: &ConnectionCredentials, secure: bool) -> CookieJar {
    jar.add(session_cookie(encode_session(credentials), secure))
}

/// Pure lookup; never touches the database.
pub fn current_session(jar: &CookieJar) -> Result<ConnectionCredentials, AbsentOrMalformed> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(AbsentOrMalformed)?;
    decode_session(cookie.value())
}

pub fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";
pub const GENERATED_PASSWORD_LEN: usize = 16;

/// 16 characters with at least one of each class, shuffled.
pub fn generate_secure_password() -> String {
    let mut rng = rand::thread_rng();
    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL].concat();

    let mut password: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL]
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while password.len() < GENERATED_PASSWORD_LEN {
        password.push(all[rng.gen_range(0..all.len())]);
    }
    password.shuffle(&mut rng);

    password.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip() {
        let samples = [
            ConnectionCredentials::anonymous("mongodb://localhost:27017"),
            ConnectionCredentials::new(
                "mongodb+srv://cluster0.example.net",
                Some("admin".into()),
                Some("p@ss:w/rd ünïcode".into()),
            ),
        ];
        for credentials in samples {
            let token = encode_session(&credentials);
            assert_eq!(decode_session(&token), Ok(credentials));
        }
    }

    #[test]
    fn test_decode_rejects_foreign_tokens() {
        let half_credentials = STANDARD.encode(
            br#"{"serverUri":"mongodb://localhost","username":"admin"}"#,
        );
        let no_uri = STANDARD.encode(br#"{"username":"a","password":"b"}"#);
        let tokens = vec![
            String::new(),
            "not base64 at all!!".to_string(),
            STANDARD.encode("plain text"),
            STANDARD.encode("[1,2,3]"),
            half_credentials,
            no_uri,
        ];
        for token in &tokens {
            assert_eq!(decode_session(token), Err(AbsentOrMalformed), "token {:?}", token);
        }
    }

    #[test]
    fn test_cookie_flags() {
        let cookie = session_cookie("token".into(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::hours(8)));

        let cookie = session_cookie("token".into(), false);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_jar_login_lookup_logout() {
        let credentials = ConnectionCredentials::anonymous("mongodb://localhost:27017");
        let jar = login(CookieJar::new(), &credentials, false);
        assert_eq!(current_session(&jar), Ok(credentials));

        let jar = logout(jar);
        assert_eq!(current_session(&jar), Err(AbsentOrMalformed));
        assert_eq!(current_session(&CookieJar::new()), Err(AbsentOrMalformed));
    }

    #[test]
    fn test_generated_password_has_every_class() {
        for _ in 0..50 {
            let password = generate_secure_password();
            assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
            let bytes = password.as_bytes();
            assert!(bytes.iter().any(|b| UPPERCASE.contains(b)));
            assert!(bytes.iter().any(|b| LOWERCASE.contains(b)));
            assert!(bytes.iter().any(|b| DIGITS.contains(b)));
            assert!(bytes.iter().any(|b| SPECIAL.contains(b)));
        }
    }
}
