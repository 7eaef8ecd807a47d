//! Client address and user-agent extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

use crate::auth::session_store::ClientInfo;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client address of a request.
///
/// With `trust_proxy` set, the first `X-Forwarded-For` hop wins. Otherwise
/// (or when the header is absent) the socket peer address is used if the
/// server was started with connect info. `None` means the address is unknown.
pub fn client_address(parts: &Parts, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return Some(addr.to_string());
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Address and user agent of the caller, recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<ClientContext> for ClientInfo {
    fn from(ctx: ClientContext) -> Self {
        ClientInfo {
            ip_address: ctx.address,
            user_agent: ctx.user_agent,
        }
    }
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(ClientContext {
            address: client_address(parts, state.config.trust_proxy_headers),
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(f) = forwarded {
            builder = builder.header(FORWARDED_FOR, f);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(p) = peer {
            parts
                .extensions
                .insert(ConnectInfo(p.parse::<SocketAddr>().unwrap()));
        }
        parts
    }

    #[test]
    fn first_forwarded_hop_when_trusted() {
        let p = parts(Some(" 203.0.113.7 , 10.0.0.1"), Some("10.0.0.2:5000"));
        assert_eq!(client_address(&p, true).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn forwarded_header_ignored_when_untrusted() {
        let p = parts(Some("203.0.113.7"), Some("10.0.0.2:5000"));
        assert_eq!(client_address(&p, false).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn unknown_without_peer_or_header() {
        assert_eq!(client_address(&parts(None, None), true), None);
        assert_eq!(client_address(&parts(Some("203.0.113.7"), None), false), None);
    }
}
