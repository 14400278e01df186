use core::fmt::{self, Display};
use hyper::{header::COOKIE, HeaderMap, StatusCode};

/// Name of the cookie that carries the session ID.
pub const COOKIE_NAME: &str = "sid";

/// Opaque 128-bit session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0; 16];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Value for the `Set-Cookie` header that hands this session to the client.
    pub fn to_cookie(self) -> String {
        format!("{COOKIE_NAME}={self}; Path=/; HttpOnly; SameSite=Strict")
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// `Set-Cookie` value that makes the client forget its session.
pub const EXPIRED_COOKIE: &str = "sid=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0";

/// Extracts the session ID from a map of headers.
pub fn extract_session(headers: &HeaderMap) -> Result<SessionId, StatusCode> {
    let value = headers
        .get(COOKIE)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .as_bytes()
        .split(|&byte| byte == b';')
        .filter_map(|section| {
            let section = section.trim_ascii_start();
            let mid = section.iter().copied().position(|byte| byte == b'=')?;
            let (left, right) = section.split_at(mid);
            let session = &right[1..];
            Some((left, session))
        })
        .find_map(|(key, session)| (key == COOKIE_NAME.as_bytes()).then_some(session))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let mut bytes = [0; 16];
    hex::decode_to_slice(value.trim_ascii_end(), &mut bytes).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok(SessionId(bytes))
}
