use base64::{engine::general_purpose, Engine as _};

/// Literal scheme prefix, case-sensitive with a single trailing space.
const BASIC_PREFIX: &str = "Basic ";

/// Result of inspecting an `Authorization` header for Basic credentials.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BasicParse {
    /// No header, or a scheme other than `Basic`.
    Absent,
    /// A Basic header whose payload could not be decoded into a
    /// `username:password` pair.
    Malformed,
    Parsed { username: String, password: String },
}

/// Decode the credentials out of an `Authorization` header value.
///
/// Anything that carries the `Basic ` prefix but fails to decode (empty
/// payload, invalid base64, non-UTF-8 bytes, missing separator, empty
/// username or password side) is `Malformed` rather than `Absent`, so the
/// caller can distinguish a broken client from one that sent nothing.
pub(crate) fn parse(header: Option<&str>) -> BasicParse {
    let Some(value) = header else {
        return BasicParse::Absent;
    };
    let Some(payload) = value.strip_prefix(BASIC_PREFIX) else {
        return BasicParse::Absent;
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return BasicParse::Malformed;
    }

    let Ok(bytes) = general_purpose::STANDARD.decode(payload) else {
        return BasicParse::Malformed;
    };
    let Ok(decoded) = String::from_utf8(bytes) else {
        return BasicParse::Malformed;
    };

    match decoded.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            BasicParse::Parsed {
                username: username.to_string(),
                password: password.to_string(),
            }
        }
        _ => BasicParse::Malformed,
    }
}
