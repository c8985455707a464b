use crate::utils::{config::SwaggerConfig, ApiError};
use anyhow::{bail, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

mod basic;
pub mod keys;

use basic::BasicParse;
pub use keys::AccessKeyTable;

/// Cookie that persists an access key across documentation navigations.
pub const ACCESS_KEY_COOKIE: &str = "swagger-access-key";
/// Query parameter carrying an explicit access key.
pub const ACCESS_KEY_PARAM: &str = "accesskey";
/// Role granted to the configured administrator account.
pub const ROLE_ADMIN: &str = "admin";

const DEFAULT_URI_PATH: &str = "/swagger";
const ACCESS_KEY_IDENTITY: &str = "accesskey";

/// Authenticated identity attached to a request's extensions for the rest
/// of its handling. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub name: String,
    pub role: String,
}

impl RequestIdentity {
    fn admin(username: &str) -> Self {
        Self {
            name: username.to_string(),
            role: ROLE_ADMIN.to_string(),
        }
    }

    fn from_access_key(role: &str) -> Self {
        Self {
            name: ACCESS_KEY_IDENTITY.to_string(),
            role: role.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// The narrow request view the gate decides on, decoupled from any
/// particular server framework.
#[derive(Debug)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    /// Value of the `accesskey` query parameter, if present.
    pub query_key: Option<&'a str>,
    /// Value of the persistence cookie, if present.
    pub cookie_key: Option<&'a str>,
    pub remote_addr: IpAddr,
    /// Raw `Authorization` header value, if present.
    pub authorization: Option<&'a str>,
}

/// What should happen to the request.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    /// Continue down the pipeline, optionally carrying an identity.
    Forward { identity: Option<RequestIdentity> },
    /// Respond 401 with a Basic challenge. `bad_attempt` marks malformed
    /// credential presentations, which are logged with the caller address;
    /// a plain missing-credentials reject is not.
    Reject { bad_attempt: bool },
}

/// Side effect on the persistence cookie, applied to the response
/// whichever way the decision went.
#[derive(Debug, PartialEq, Eq)]
pub enum CookieAction {
    Persist(String),
    Clear,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    pub cookie: Option<CookieAction>,
}

/// Authorization gate for the documentation endpoint.
///
/// All state is resolved once at construction and read-only afterwards;
/// evaluation is a pure function of the request view, safe for concurrent
/// use behind an `Arc`.
#[derive(Debug)]
pub struct SwaggerGate {
    uri_path: String,
    username: String,
    password: String,
    access_keys: Option<AccessKeyTable>,
    local_bypass_enabled: bool,
}

impl SwaggerGate {
    /// Resolve gate configuration, failing fast on anything that would
    /// leave the gate unable to make sound decisions.
    pub fn new(config: &SwaggerConfig) -> Result<Self> {
        if config.username.is_empty() {
            bail!("documentation admin username must be configured and non-empty");
        }
        if config.password.is_empty() {
            bail!("documentation admin password must be configured and non-empty");
        }

        let uri_path = match config.uri.as_deref() {
            Some(uri) if !uri.is_empty() => {
                if !uri.starts_with('/') {
                    bail!("documentation uri {uri:?} must start with '/'");
                }
                uri.to_string()
            }
            _ => {
                debug!("no documentation uri configured, defaulting to '{DEFAULT_URI_PATH}'");
                DEFAULT_URI_PATH.to_string()
            }
        };

        let access_keys = if config.access_keys.is_empty() {
            None
        } else {
            Some(AccessKeyTable::parse(&config.access_keys)?)
        };

        Ok(Self {
            uri_path,
            username: config.username.clone(),
            password: config.password.clone(),
            access_keys,
            local_bypass_enabled: config.local_bypass_enabled,
        })
    }

    /// The URI prefix this gate intercepts.
    pub fn uri_path(&self) -> &str {
        &self.uri_path
    }

    /// Segment-aware prefix check: `/swagger/ui` is guarded, `/swaggerx`
    /// is not. Allocation-free, since it runs on every request the host
    /// serves.
    pub fn guards(&self, path: &str) -> bool {
        match path.strip_prefix(self.uri_path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Run the ordered decision chain: prefix filter, access key, local
    /// bypass, Basic credentials, reject.
    pub fn evaluate(&self, request: &GateRequest<'_>) -> Outcome {
        if !self.guards(request.path) {
            return Outcome {
                decision: Decision::Forward { identity: None },
                cookie: None,
            };
        }

        let mut cookie = None;

        if let Some(table) = &self.access_keys {
            // An explicit but empty `?accesskey=` counts as no key supplied.
            let query_key = request.query_key.filter(|key| !key.is_empty());

            // Re-visiting the landing page without an explicit key clears
            // any stored key: the cookie is deliberately not consulted as
            // a candidate here, so this acts as a logout trigger.
            let reset = query_key.is_none() && self.is_landing_page(request.path);
            if reset {
                cookie = Some(CookieAction::Clear);
            }

            let candidate = if reset {
                None
            } else {
                query_key.or(request.cookie_key)
            };

            if let Some(role) = candidate.and_then(|key| table.role_for_key(key)) {
                // Re-issue the cookie so subsequent navigations (static
                // assets of the UI) authenticate without the query key.
                let persist = (role != ROLE_ADMIN)
                    .then(|| table.key_for_role(role))
                    .flatten()
                    .map(|key| CookieAction::Persist(key.to_string()));
                return Outcome {
                    decision: Decision::Forward {
                        identity: Some(RequestIdentity::from_access_key(role)),
                    },
                    cookie: persist,
                };
            }
        }

        if self.local_bypass_enabled && request.remote_addr.is_loopback() {
            debug!("allowing documentation access for loopback caller");
            return Outcome {
                decision: Decision::Forward { identity: None },
                cookie,
            };
        }

        match basic::parse(request.authorization) {
            BasicParse::Absent => {}
            BasicParse::Malformed => {
                debug!(
                    remote_addr = %request.remote_addr,
                    "malformed Basic credentials on documentation endpoint"
                );
                return Outcome {
                    decision: Decision::Reject { bad_attempt: true },
                    cookie,
                };
            }
            BasicParse::Parsed { username, password } => {
                if self.admin_matches(&username, &password) {
                    return Outcome {
                        decision: Decision::Forward {
                            identity: Some(RequestIdentity::admin(&self.username)),
                        },
                        cookie,
                    };
                }
                // Wrong credentials fall through to the plain reject.
            }
        }

        Outcome {
            decision: Decision::Reject { bad_attempt: false },
            cookie,
        }
    }

    fn is_landing_page(&self, path: &str) -> bool {
        path == self.uri_path
            || path.strip_prefix(self.uri_path.as_str()) == Some("/index.html")
    }

    fn admin_matches(&self, username: &str, password: &str) -> bool {
        // Constant-time password comparison; usernames are not secret.
        let password_ok: bool = password.as_bytes().ct_eq(self.password.as_bytes()).into();
        username.eq_ignore_ascii_case(&self.username) && password_ok
    }
}

/// Axum middleware adapter around [`SwaggerGate::evaluate`].
///
/// Mounted over the whole router; the prefix filter makes it a cheap
/// pass-through for non-documentation traffic. Calls `next` exactly once
/// per admitted request and never after rejecting.
pub async fn gate_middleware(
    State(gate): State<Arc<SwaggerGate>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    // Fast path: nothing below the guarded prefix, not even cookie parsing.
    if !gate.guards(request.uri().path()) {
        return next.run(request).await;
    }

    let jar = CookieJar::from_headers(request.headers());
    let outcome = {
        let query_key = request.uri().query().and_then(query_access_key);
        let view = GateRequest {
            path: request.uri().path(),
            query_key: query_key.as_deref(),
            cookie_key: jar.get(ACCESS_KEY_COOKIE).map(|cookie| cookie.value()),
            remote_addr: addr.ip(),
            authorization: request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
        };
        gate.evaluate(&view)
    };

    let jar = match outcome.cookie {
        Some(CookieAction::Persist(key)) => jar.add(
            Cookie::build((ACCESS_KEY_COOKIE, key))
                .path("/")
                .build(),
        ),
        Some(CookieAction::Clear) => {
            jar.remove(Cookie::build(ACCESS_KEY_COOKIE).path("/").build())
        }
        None => jar,
    };

    match outcome.decision {
        Decision::Forward { identity } => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            (jar, next.run(request).await).into_response()
        }
        Decision::Reject { .. } => (jar, challenge()).into_response(),
    }
}

/// Extract the `accesskey` parameter from a raw query string. The first
/// occurrence wins; an empty value is treated as absent.
fn query_access_key(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == ACCESS_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// 401 response carrying the Basic challenge header.
fn challenge() -> Response {
    let mut response = ApiError::authentication_error("authentication required").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};

    fn config(keys: &[&str]) -> SwaggerConfig {
        SwaggerConfig {
            uri: None,
            username: "admin".to_string(),
            password: "correct-pw".to_string(),
            access_keys: keys.iter().map(|s| s.to_string()).collect(),
            local_bypass_enabled: false,
        }
    }

    fn gate(keys: &[&str]) -> SwaggerGate {
        SwaggerGate::new(&config(keys)).unwrap()
    }

    fn view(path: &str) -> GateRequest<'_> {
        GateRequest {
            path,
            query_key: None,
            cookie_key: None,
            remote_addr: IpAddr::from([203, 0, 113, 9]),
            authorization: None,
        }
    }

    fn forward_unmodified() -> Outcome {
        Outcome {
            decision: Decision::Forward { identity: None },
            cookie: None,
        }
    }

    fn basic_header(credentials: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }

    #[test]
    fn paths_outside_the_prefix_forward_unmodified() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            authorization: Some("Basic !!!garbage!!!"),
            cookie_key: Some("editor-key"),
            ..view("/api/things")
        });

        assert_eq!(outcome, forward_unmodified());
    }

    #[test]
    fn prefix_match_is_segment_aware() {
        let gate = gate(&[]);

        assert_eq!(gate.evaluate(&view("/swaggerx")), forward_unmodified());
        assert!(matches!(
            gate.evaluate(&view("/swagger/ui")).decision,
            Decision::Reject { bad_attempt: false }
        ));
        assert!(matches!(
            gate.evaluate(&view("/swagger")).decision,
            Decision::Reject { bad_attempt: false }
        ));
    }

    #[test]
    fn query_key_grants_role_and_persists_cookie() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("editor-key"),
            ..view("/swagger")
        });

        assert_eq!(
            outcome,
            Outcome {
                decision: Decision::Forward {
                    identity: Some(RequestIdentity {
                        name: "accesskey".to_string(),
                        role: "editor".to_string(),
                    }),
                },
                cookie: Some(CookieAction::Persist("editor-key".to_string())),
            }
        );
    }

    #[test]
    fn admin_role_key_does_not_persist_a_cookie() {
        let gate = gate(&["admin:admin-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("admin-key"),
            ..view("/swagger")
        });

        assert!(matches!(
            outcome.decision,
            Decision::Forward { identity: Some(ref identity) } if identity.is_admin()
        ));
        assert_eq!(outcome.cookie, None);
    }

    #[test]
    fn cookie_key_authenticates_off_the_landing_page() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            cookie_key: Some("editor-key"),
            ..view("/swagger/swagger-ui.css")
        });

        assert!(matches!(
            outcome.decision,
            Decision::Forward { identity: Some(ref identity) } if identity.role == "editor"
        ));
        assert_eq!(
            outcome.cookie,
            Some(CookieAction::Persist("editor-key".to_string()))
        );
    }

    #[test]
    fn landing_page_without_query_key_clears_the_cookie() {
        let gate = gate(&["editor:editor-key"]);

        // Even a valid stored key is cleared and not consulted.
        for path in ["/swagger", "/swagger/index.html"] {
            let outcome = gate.evaluate(&GateRequest {
                cookie_key: Some("editor-key"),
                ..view(path)
            });

            assert_eq!(outcome.cookie, Some(CookieAction::Clear));
            assert_eq!(
                outcome.decision,
                Decision::Reject { bad_attempt: false }
            );
        }
    }

    #[test]
    fn empty_query_key_counts_as_absent() {
        let gate = gate(&["editor:editor-key"]);

        // The reset still fires, and the empty value is not a candidate.
        let outcome = gate.evaluate(&GateRequest {
            query_key: Some(""),
            cookie_key: Some("editor-key"),
            ..view("/swagger")
        });

        assert_eq!(outcome.cookie, Some(CookieAction::Clear));
        assert_eq!(outcome.decision, Decision::Reject { bad_attempt: false });
    }

    #[test]
    fn landing_page_with_query_key_does_not_reset() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("editor-key"),
            cookie_key: Some("stale-key"),
            ..view("/swagger/index.html")
        });

        assert!(matches!(outcome.decision, Decision::Forward { .. }));
        assert_eq!(
            outcome.cookie,
            Some(CookieAction::Persist("editor-key".to_string()))
        );
    }

    #[test]
    fn query_key_wins_over_cookie_key() {
        let gate = gate(&["editor:editor-key", "viewer:viewer-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("viewer-key"),
            cookie_key: Some("editor-key"),
            ..view("/swagger/openapi.json")
        });

        assert!(matches!(
            outcome.decision,
            Decision::Forward { identity: Some(ref identity) } if identity.role == "viewer"
        ));
    }

    #[test]
    fn unknown_key_falls_through_to_reject() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("wrong-key"),
            ..view("/swagger/openapi.json")
        });

        assert_eq!(
            outcome,
            Outcome {
                decision: Decision::Reject { bad_attempt: false },
                cookie: None,
            }
        );
    }

    #[test]
    fn valid_key_wins_over_malformed_basic_header() {
        let gate = gate(&["editor:editor-key"]);

        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("editor-key"),
            authorization: Some("Basic !!!garbage!!!"),
            ..view("/swagger/openapi.json")
        });

        assert!(matches!(outcome.decision, Decision::Forward { .. }));
    }

    #[test]
    fn loopback_bypass_forwards_without_identity() {
        let mut cfg = config(&[]);
        cfg.local_bypass_enabled = true;
        let gate = SwaggerGate::new(&cfg).unwrap();

        let outcome = gate.evaluate(&GateRequest {
            remote_addr: IpAddr::from([127, 0, 0, 1]),
            ..view("/swagger")
        });

        assert_eq!(outcome, forward_unmodified());
    }

    #[test]
    fn bypass_requires_both_flag_and_loopback() {
        // Flag off, loopback caller.
        let gate_no_flag = gate(&[]);
        assert!(matches!(
            gate_no_flag
                .evaluate(&GateRequest {
                    remote_addr: IpAddr::from([127, 0, 0, 1]),
                    ..view("/swagger")
                })
                .decision,
            Decision::Reject { .. }
        ));

        // Flag on, remote caller.
        let mut cfg = config(&[]);
        cfg.local_bypass_enabled = true;
        let gate_remote = SwaggerGate::new(&cfg).unwrap();
        assert!(matches!(
            gate_remote.evaluate(&view("/swagger")).decision,
            Decision::Reject { .. }
        ));
    }

    #[test]
    fn basic_credentials_grant_admin() {
        let gate = gate(&[]);

        let header = basic_header("admin:correct-pw");
        let outcome = gate.evaluate(&GateRequest {
            authorization: Some(&header),
            ..view("/swagger")
        });

        assert_eq!(
            outcome,
            Outcome {
                decision: Decision::Forward {
                    identity: Some(RequestIdentity {
                        name: "admin".to_string(),
                        role: "admin".to_string(),
                    }),
                },
                cookie: None,
            }
        );
    }

    #[test]
    fn basic_username_is_case_insensitive_password_is_not() {
        let gate = gate(&[]);

        let header = basic_header("ADMIN:correct-pw");
        assert!(matches!(
            gate.evaluate(&GateRequest {
                authorization: Some(&header),
                ..view("/swagger")
            })
            .decision,
            Decision::Forward { .. }
        ));

        let header = basic_header("admin:CORRECT-PW");
        assert_eq!(
            gate.evaluate(&GateRequest {
                authorization: Some(&header),
                ..view("/swagger")
            })
            .decision,
            Decision::Reject { bad_attempt: false }
        );
    }

    #[test]
    fn malformed_basic_payloads_are_bad_attempts() {
        let gate = gate(&[]);

        let no_separator = basic_header("no-separator");
        for header in ["Basic ", "Basic !!!garbage!!!", no_separator.as_str()] {
            let outcome = gate.evaluate(&GateRequest {
                authorization: Some(header),
                ..view("/swagger")
            });
            assert_eq!(outcome.decision, Decision::Reject { bad_attempt: true });
        }
    }

    #[test]
    fn wrong_credentials_are_not_flagged_as_bad_attempts() {
        let gate = gate(&[]);

        let header = basic_header("intruder:wrong-pw");
        let outcome = gate.evaluate(&GateRequest {
            authorization: Some(&header),
            ..view("/swagger")
        });

        assert_eq!(outcome.decision, Decision::Reject { bad_attempt: false });
    }

    #[test]
    fn non_basic_schemes_fall_through_to_plain_reject() {
        let gate = gate(&[]);

        let outcome = gate.evaluate(&GateRequest {
            authorization: Some("Bearer some-token"),
            ..view("/swagger")
        });

        assert_eq!(outcome.decision, Decision::Reject { bad_attempt: false });
    }

    #[test]
    fn key_check_is_skipped_without_a_table() {
        let gate = gate(&[]);

        // No table configured: a key in the query is meaningless, and the
        // landing page performs no cookie reset.
        let outcome = gate.evaluate(&GateRequest {
            query_key: Some("editor-key"),
            cookie_key: Some("editor-key"),
            ..view("/swagger")
        });

        assert_eq!(
            outcome,
            Outcome {
                decision: Decision::Reject { bad_attempt: false },
                cookie: None,
            }
        );
    }

    #[test]
    fn construction_requires_non_empty_credentials() {
        let mut cfg = config(&[]);
        cfg.username = String::new();
        assert!(SwaggerGate::new(&cfg).is_err());

        let mut cfg = config(&[]);
        cfg.password = String::new();
        assert!(SwaggerGate::new(&cfg).is_err());
    }

    #[test]
    fn construction_rejects_malformed_key_entries() {
        assert!(SwaggerGate::new(&config(&["missing-colon"])).is_err());
        assert!(SwaggerGate::new(&config(&[":no-role"])).is_err());
        assert!(SwaggerGate::new(&config(&["no-key:"])).is_err());
    }

    #[test]
    fn construction_rejects_a_relative_uri() {
        let mut cfg = config(&[]);
        cfg.uri = Some("docs".to_string());
        assert!(SwaggerGate::new(&cfg).is_err());
    }

    #[test]
    fn uri_path_defaults_and_can_be_configured() {
        assert_eq!(gate(&[]).uri_path(), "/swagger");

        let mut cfg = config(&[]);
        cfg.uri = Some("/docs".to_string());
        let gate = SwaggerGate::new(&cfg).unwrap();
        assert_eq!(gate.uri_path(), "/docs");
        assert!(gate.guards("/docs/index.html"));
        assert!(!gate.guards("/swagger"));
    }
}
