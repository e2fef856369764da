use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// API routes segregated by caller role (public, authenticated, customer, seller).
pub mod routes;
use routes::{authenticated, customer, public, seller};

use auth::{
    Authorizer, TokenCodec,
    edge::{EdgeGuard, edge_guard},
    policy::RoutePolicy,
};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the storefront API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me,
        handlers::get_products, handlers::get_product, handlers::get_seller_products,
        handlers::create_product, handlers::update_product, handlers::delete_product,
        handlers::get_cart, handlers::add_to_cart, handlers::update_cart_item,
        handlers::delete_cart_item, handlers::get_wishlist, handlers::add_to_wishlist,
        handlers::delete_wishlist_item, handlers::checkout, handlers::get_orders,
        handlers::get_order, handlers::pay_order
    ),
    components(
        schemas(
            models::User, models::UserProfile, models::Product, models::CartItem,
            models::WishlistItem, models::Order, models::OrderItem, models::Payment,
            models::RegisterRequest, models::LoginRequest, models::AuthResponse,
            models::CreateProductRequest, models::UpdateProductRequest,
            models::AddCartItemRequest, models::UpdateCartItemRequest,
            models::AddWishlistItemRequest, models::PaymentRequest,
            error::ErrorBody, auth::Role,
        )
    ),
    tags(
        (name = "storefront", description = "Storefront catalog, cart and order API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Immutable container shared by every request: the persistence handle, the
/// configuration, and the two guards built from one `Authorizer`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub authorizer: Authorizer,
    pub edge: EdgeGuard,
}

impl AppState {
    /// Builds the state with the storefront route tables.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, regex::Error> {
        let policy = RoutePolicy::storefront(config.unlisted_routes)?;
        Ok(Self::with_policy(repo, config, policy))
    }

    /// Builds the state with a caller-supplied route policy.
    pub fn with_policy(repo: RepositoryState, config: AppConfig, policy: RoutePolicy) -> Self {
        let authorizer = Authorizer::new(TokenCodec::new(&config.jwt_secret, config.token_ttl_days));
        let edge = EdgeGuard::new(policy, authorizer.clone());
        Self {
            repo,
            config,
            authorizer,
            edge,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Authorizer {
    fn from_ref(app_state: &AppState) -> Authorizer {
        app_state.authorizer.clone()
    }
}

impl FromRef<AppState> for EdgeGuard {
    fn from_ref(app_state: &AppState) -> EdgeGuard {
        app_state.edge.clone()
    }
}

/// create_router
///
/// Assembles the API routes, the page fallback and the middleware stack.
/// The edge guard wraps everything, so it sees every path before routing;
/// pages that pass it are served from `site_root`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let site_root = state.config.site_root.clone();
    let pages = ServeDir::new(&site_root)
        .fallback(ServeFile::new(format!("{site_root}/index.html")));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(customer::customer_routes())
        .merge(seller::seller_routes())
        // Anything that is not an API route is a storefront page or asset.
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(state.clone(), edge_guard))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span per request carrying the method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
