use regex::Regex;

use super::role::Role;

/// What the edge guard does with a path no route table mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlistedRoutes {
    /// Pass through without checking for a token (fail-open).
    Allow,
    /// Require any valid session, like a shared-protected entry.
    Deny,
}

/// RouteMatcher
///
/// Exact string comparison or an anchored regular expression.
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    Exact(String),
    Pattern(Regex),
}

impl RouteMatcher {
    pub fn exact(path: impl Into<String>) -> Self {
        RouteMatcher::Exact(path.into())
    }

    pub fn pattern(expr: &str) -> Result<Self, regex::Error> {
        Regex::new(expr).map(RouteMatcher::Pattern)
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RouteMatcher::Exact(expected) => expected == path,
            RouteMatcher::Pattern(re) => re.is_match(path),
        }
    }
}

/// RouteRule
///
/// A protected page. `allowed_roles == None` admits any authenticated caller.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub matcher: RouteMatcher,
    pub allowed_roles: Option<Vec<Role>>,
}

/// RoutePolicy
///
/// The route tables consulted by the edge guard. Built once at startup and
/// handed to the guard; tests build their own.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Pages anyone may load.
    pub public: Vec<RouteMatcher>,
    /// Protected pages, first match wins in declaration order.
    pub protected: Vec<RouteRule>,
    /// Prefixes the edge guard never inspects. `/api` is listed because API
    /// handlers authenticate every call themselves.
    pub bypass_prefixes: Vec<String>,
    pub unlisted: UnlistedRoutes,
    pub login_path: String,
    pub dashboard_path: String,
    pub cookie_name: String,
}

impl RoutePolicy {
    /// An empty policy with the storefront's redirect targets and cookie name.
    pub fn new(unlisted: UnlistedRoutes) -> Self {
        Self {
            public: Vec::new(),
            protected: Vec::new(),
            bypass_prefixes: Vec::new(),
            unlisted,
            login_path: "/auth".to_string(),
            dashboard_path: "/dashboard".to_string(),
            cookie_name: "token".to_string(),
        }
    }

    pub fn public(mut self, matcher: RouteMatcher) -> Self {
        self.public.push(matcher);
        self
    }

    pub fn protect(mut self, matcher: RouteMatcher, allowed_roles: &[Role]) -> Self {
        self.protected.push(RouteRule {
            matcher,
            allowed_roles: Some(allowed_roles.to_vec()),
        });
        self
    }

    pub fn protect_any(mut self, matcher: RouteMatcher) -> Self {
        self.protected.push(RouteRule {
            matcher,
            allowed_roles: None,
        });
        self
    }

    pub fn bypass(mut self, prefix: impl Into<String>) -> Self {
        self.bypass_prefixes.push(prefix.into());
        self
    }

    /// The storefront's route tables: customer pages, seller dashboard pages,
    /// pages shared by every signed-in caller, and the public catalog.
    pub fn storefront(unlisted: UnlistedRoutes) -> Result<Self, regex::Error> {
        use RouteMatcher as M;

        Ok(Self::new(unlisted)
            // Public catalog and sign-in
            .public(M::exact("/"))
            .public(M::exact("/auth"))
            .public(M::exact("/products"))
            .public(M::pattern(r"^/products/[^/]+$")?)
            .public(M::pattern(r"^/categories(/[^/]+)?$")?)
            .public(M::exact("/about"))
            .public(M::exact("/contact"))
            // Customer-only
            .protect(M::exact("/cart"), &[Role::Customer])
            .protect(M::exact("/wishlist"), &[Role::Customer])
            .protect(M::exact("/checkout"), &[Role::Customer])
            .protect(M::exact("/orders"), &[Role::Customer])
            .protect(M::pattern(r"^/orders/[^/]+$")?, &[Role::Customer])
            // Seller-only
            .protect(M::exact("/dashboard/products"), &[Role::Seller])
            .protect(M::exact("/dashboard/products/new"), &[Role::Seller])
            .protect(M::pattern(r"^/dashboard/products/[^/]+(/edit)?$")?, &[Role::Seller])
            .protect(M::exact("/dashboard/sales"), &[Role::Seller])
            .protect(M::exact("/dashboard/analytics"), &[Role::Seller])
            // Any signed-in caller
            .protect_any(M::exact("/dashboard"))
            .protect_any(M::exact("/profile"))
            .protect_any(M::exact("/settings"))
            // Framework assets and self-protecting API routes
            .bypass("/api")
            .bypass("/_next")
            .bypass("/static")
            .bypass("/favicon.ico"))
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|matcher| matcher.matches(path))
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn match_rule(&self, path: &str) -> Option<&RouteRule> {
        self.protected.iter().find(|rule| rule.matcher.matches(path))
    }
}
