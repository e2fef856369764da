//! Edge route guard.
//!
//! Runs in front of every request, before pages are served. It only looks at
//! the path and the `token` cookie, and answers with redirects rather than
//! error bodies.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use super::{
    Authorizer, credentials,
    policy::{RoutePolicy, UnlistedRoutes},
    role::Role,
};

/// The outcome of evaluating one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    Pass,
    /// Serve the page but drop the stale token cookie.
    PassClearingToken,
    /// Send the caller to the login page, returning to `callback_url` after
    /// sign-in. `clear_token` is set when a token was present but rejected.
    RedirectToLogin {
        callback_url: String,
        clear_token: bool,
    },
    /// Signed in, but the role does not match this page.
    RedirectToDashboard,
}

/// EdgeGuard
///
/// Evaluates paths against a [`RoutePolicy`] using the shared [`Authorizer`].
#[derive(Clone)]
pub struct EdgeGuard {
    policy: Arc<RoutePolicy>,
    authorizer: Authorizer,
}

impl EdgeGuard {
    pub fn new(policy: RoutePolicy, authorizer: Authorizer) -> Self {
        Self {
            policy: Arc::new(policy),
            authorizer,
        }
    }

    /// evaluate
    ///
    /// `path` is first reduced with [`canonical_path`], so every spelling the
    /// page server resolves to the same file gets the same decision.
    ///
    /// 1. Bypass prefixes and public pages pass without a token check. The
    ///    login page additionally flags an invalid token for removal.
    /// 2. The first protected rule matching the path decides the roles.
    /// 3. Unlisted paths pass, unless the policy denies them, in which case
    ///    they need any valid session.
    /// 4. No token redirects to login; a rejected token redirects to login
    ///    and clears the cookie; a role outside the rule redirects to the
    ///    dashboard.
    pub fn evaluate(&self, path: &str, token: Option<&str>) -> EdgeDecision {
        let canonical = canonical_path(path);
        let path = canonical.as_str();

        if self.policy.is_bypassed(path) {
            // API handlers authenticate each call themselves.
            tracing::trace!(path, "edge guard bypass");
            return EdgeDecision::Pass;
        }

        if self.policy.is_public(path) {
            if path == self.policy.login_path
                && token.is_some_and(|token| self.authorizer.verify(token).is_err())
            {
                return EdgeDecision::PassClearingToken;
            }
            return EdgeDecision::Pass;
        }

        let allowed: Option<&[Role]> = match self.policy.match_rule(path) {
            Some(rule) => rule.allowed_roles.as_deref(),
            None => match self.policy.unlisted {
                UnlistedRoutes::Allow => return EdgeDecision::Pass,
                UnlistedRoutes::Deny => None,
            },
        };

        let Some(token) = token else {
            tracing::debug!(path, "no session cookie, redirecting to login");
            return EdgeDecision::RedirectToLogin {
                callback_url: path.to_string(),
                clear_token: false,
            };
        };

        let claims = match self.authorizer.verify(token) {
            Ok(claims) => claims,
            Err(_) => {
                tracing::debug!(path, "invalid session cookie, redirecting to login");
                return EdgeDecision::RedirectToLogin {
                    callback_url: path.to_string(),
                    clear_token: true,
                };
            }
        };

        if self.authorizer.permits(&claims.role, allowed) {
            EdgeDecision::Pass
        } else {
            tracing::debug!(path, role = %claims.role, "role not allowed on page");
            EdgeDecision::RedirectToDashboard
        }
    }

    /// `/auth?callbackUrl=<urlencoded path>`
    pub fn login_redirect_url(&self, callback_url: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("callbackUrl", callback_url)
            .finish();
        format!("{}?{}", self.policy.login_path, query)
    }

    fn clear_token(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build((self.policy.cookie_name.clone(), "")).path("/"))
    }
}

/// canonical_path
///
/// The page a request path resolves to once the static page server has
/// handled it: percent-decoded, empty and `.` segments dropped, `..` applied,
/// and a trailing `index.html` or `.html` suffix removed. `/cart/`,
/// `/cart/index.html`, `//cart` and `/%63art` all become `/cart`.
pub fn canonical_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    if segments.last() == Some(&"index.html") {
        segments.pop();
    }

    let mut path = format!("/{}", segments.join("/"));
    if path.len() > 1 && path.ends_with(".html") {
        path.truncate(path.len() - ".html".len());
    }
    path
}

/// edge_guard
///
/// Axum middleware adapter: reads the token cookie, evaluates the path and
/// turns the decision into a pass-through or a temporary redirect.
pub async fn edge_guard(
    State(guard): State<EdgeGuard>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let token =
        credentials::token_from_cookie(&jar, &guard.policy.cookie_name).map(str::to_owned);

    match guard.evaluate(&path, token.as_deref()) {
        EdgeDecision::Pass => next.run(request).await,
        EdgeDecision::PassClearingToken => {
            let response = next.run(request).await;
            (guard.clear_token(jar), response).into_response()
        }
        EdgeDecision::RedirectToLogin {
            callback_url,
            clear_token,
        } => {
            let redirect = Redirect::temporary(&guard.login_redirect_url(&callback_url));
            if clear_token {
                (guard.clear_token(jar), redirect).into_response()
            } else {
                redirect.into_response()
            }
        }
        EdgeDecision::RedirectToDashboard => {
            Redirect::temporary(&guard.policy.dashboard_path).into_response()
        }
    }
}
