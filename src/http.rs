//! HTTP API for the learning platform
//!
//! ## Progress & ordering
//! - `GET /trails/{id}/progress` - Caller's progress with blocked flags
//! - `POST /categories/reorder` - Replace the full category order of a trail
//!
//! ## Resources
//! - `/trails`, `/categories`, `/modules`, `/module-contents`
//! - `/challenges`, `/challenge-questions`
//! - `/users`, `/module-completions`, `/challenge-completions`
//! - `GET /health`
//!
//! Every route except `GET /health` and `POST /users` needs the `X-User-Id`
//! header; writes to the catalogue need the admin role.
//!
//! ## Example Usage
//!
//! ```bash
//! # Progress of a user through a trail
//! curl -H "X-User-Id: $USER" http://localhost:3000/trails/$TRAIL/progress
//!
//! # Reorder the categories of a trail
//! curl -X POST -H "X-User-Id: $ADMIN" -H "Content-Type: application/json" \
//!      -d '{"trailId":"'$TRAIL'","categories":[{"id":"'$A'","order":2},{"id":"'$B'","order":1}]}' \
//!      http://localhost:3000/categories/reorder
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::auth::{self, Caller};
use crate::error::TrailError;
use crate::services::module_service::CompletionInput;
use crate::services::{
    created, error_response, method_not_allowed, no_content, not_found, ok, HandlerResult, Services,
};
use crate::views::{
    CategoryDetailView, CategoryView, ChallengeResultView, ChallengeToRespondView, ChallengeView, CompletionCountsView,
    CompletionView, HealthView, ModuleContentView, ModuleDetailView, ModuleView, QuestionView, TrailOutlineView,
    TrailProgressView, TrailView, UserView,
};

/// `?trailId=` filter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrailFilter {
    trail_id: Option<String>,
}

/// `?categoryId=` filter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryFilter {
    category_id: Option<String>,
}

/// `?moduleId=` filter
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleFilter {
    module_id: Option<String>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
    cors_origin: HeaderValue,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
            cors_origin: HeaderValue::from_static("*"),
        }
    }

    /// Set the Access-Control-Allow-Origin value
    pub fn with_cors_origin(mut self, origin: &str) -> Result<Self, TrailError> {
        self.cors_origin = HeaderValue::from_str(origin)
            .map_err(|e| TrailError::Config(format!("Invalid CORS origin '{}': {}", origin, e)))?;
        Ok(self)
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), TrailError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route a request and decorate the response with CORS headers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!(method = %method, path = %path, "Incoming request");

        let mut response = if method == Method::OPTIONS {
            no_content()
        } else {
            self.route(req, &method, &path).await.unwrap_or_else(error_response)
        };

        self.apply_cors(response.headers_mut());
        debug!(method = %method, path = %path, status = %response.status(), "Request handled");
        Ok(response)
    }

    fn apply_cors(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.cors_origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PATCH, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, X-User-Id"),
        );
    }

    /// Route requests to handlers
    async fn route(&self, req: Request<Incoming>, method: &Method, path: &str) -> HandlerResult {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["health"] if *method == Method::GET => self.handle_health(),
            ["users", rest @ ..] => self.handle_users(req, method, rest).await,
            ["trails", rest @ ..] => self.handle_trails(req, method, rest).await,
            ["categories", rest @ ..] => self.handle_categories(req, method, rest).await,
            ["modules", rest @ ..] => self.handle_modules(req, method, rest).await,
            ["module-contents", rest @ ..] => self.handle_contents(req, method, rest).await,
            ["challenges", rest @ ..] => self.handle_challenges(req, method, rest).await,
            ["challenge-questions", rest @ ..] => self.handle_questions(req, method, rest).await,
            ["module-completions"] if *method == Method::POST => {
                self.admin(&req)?;
                let row = self.services.completions.record_module(read_json(req).await?)?;
                Ok(created(&CompletionView::from(row)))
            }
            ["challenge-completions"] if *method == Method::POST => {
                self.admin(&req)?;
                let row = self.services.completions.record_challenge(read_json(req).await?)?;
                Ok(created(&CompletionView::from(row)))
            }
            _ => Ok(not_found("Not Found")),
        }
    }

    fn caller(&self, req: &Request<Incoming>) -> Result<Caller, TrailError> {
        auth::authenticate(&self.services.users, req.headers())
    }

    fn admin(&self, req: &Request<Incoming>) -> Result<Caller, TrailError> {
        let caller = self.caller(req)?;
        caller.require_admin()?;
        Ok(caller)
    }

    /// Health check endpoint
    fn handle_health(&self) -> HandlerResult {
        let stats = self.services.db.stats()?;
        Ok(ok(&HealthView::from(stats)))
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn handle_users(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::POST, []) => {
                let user = self.services.users.register(read_json(req).await?)?;
                Ok(created(&UserView::from(user)))
            }
            (&Method::GET, []) => {
                self.admin(&req)?;
                let users = self.services.users.list()?;
                Ok(ok(&users.into_iter().map(UserView::from).collect::<Vec<_>>()))
            }
            (&Method::GET, ["me"]) => {
                let caller = self.caller(&req)?;
                Ok(ok(&UserView::from(caller.user)))
            }
            (&Method::GET, ["me", "progress"]) => {
                let caller = self.caller(&req)?;
                let counts = self.services.users.completion_counts(caller.id())?;
                Ok(ok(&CompletionCountsView::from(counts)))
            }
            (&Method::GET, [id]) => {
                self.admin(&req)?;
                Ok(ok(&UserView::from(self.services.users.get(id)?)))
            }
            _ => Ok(method_not_allowed()),
        }
    }

    // =========================================================================
    // Trails
    // =========================================================================

    async fn handle_trails(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, []) => {
                self.caller(&req)?;
                let trails = self.services.trails.list()?;
                Ok(ok(&trails.into_iter().map(TrailOutlineView::from).collect::<Vec<_>>()))
            }
            (&Method::POST, []) => {
                self.admin(&req)?;
                let trail = self.services.trails.create(read_json(req).await?)?;
                Ok(created(&TrailView::from(trail)))
            }
            (&Method::GET, [id]) => {
                self.caller(&req)?;
                Ok(ok(&TrailOutlineView::from(self.services.trails.get(id)?)))
            }
            (&Method::PATCH, [id]) => {
                self.admin(&req)?;
                let trail = self.services.trails.update(id, read_json(req).await?)?;
                Ok(ok(&TrailView::from(trail)))
            }
            (&Method::DELETE, [id]) => {
                self.admin(&req)?;
                self.services.trails.delete(id)?;
                Ok(no_content())
            }
            (&Method::GET, [id, "progress"]) => {
                let caller = self.caller(&req)?;
                let progress = self.services.trails.progress(id, caller.id())?;
                Ok(ok(&TrailProgressView::from(progress)))
            }
            _ => Ok(method_not_allowed()),
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    async fn handle_categories(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, []) => {
                self.caller(&req)?;
                let filter: TrailFilter = read_query(&req)?;
                let categories = self.services.categories.list(filter.trail_id.as_deref())?;
                Ok(ok(&categories.into_iter().map(CategoryDetailView::from).collect::<Vec<_>>()))
            }
            (&Method::POST, []) => {
                self.admin(&req)?;
                let category = self.services.categories.create(read_json(req).await?)?;
                Ok(created(&CategoryView::from(category)))
            }
            (&Method::POST, ["reorder"]) => {
                self.admin(&req)?;
                let updated = self.services.categories.reorder(read_json(req).await?)?;
                Ok(ok(&updated.into_iter().map(CategoryView::from).collect::<Vec<_>>()))
            }
            (&Method::GET, [id]) => {
                self.caller(&req)?;
                Ok(ok(&CategoryDetailView::from(self.services.categories.get(id)?)))
            }
            (&Method::PATCH, [id]) => {
                self.admin(&req)?;
                let category = self.services.categories.update(id, read_json(req).await?)?;
                Ok(ok(&CategoryView::from(category)))
            }
            (&Method::DELETE, [id]) => {
                self.admin(&req)?;
                self.services.categories.delete(id)?;
                Ok(no_content())
            }
            _ => Ok(method_not_allowed()),
        }
    }

    // =========================================================================
    // Modules & contents
    // =========================================================================

    async fn handle_modules(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, []) => {
                self.caller(&req)?;
                let filter: CategoryFilter = read_query(&req)?;
                let modules = self.services.modules.list(filter.category_id.as_deref())?;
                Ok(ok(&modules.into_iter().map(ModuleView::from).collect::<Vec<_>>()))
            }
            (&Method::POST, []) => {
                self.admin(&req)?;
                let module = self.services.modules.create(read_json(req).await?)?;
                Ok(created(&ModuleView::from(module)))
            }
            (&Method::GET, [id]) => {
                let caller = self.caller(&req)?;
                Ok(ok(&ModuleDetailView::from(self.services.modules.get(id, caller.id())?)))
            }
            (&Method::PATCH, [id]) => {
                self.admin(&req)?;
                let module = self.services.modules.update(id, read_json(req).await?)?;
                Ok(ok(&ModuleView::from(module)))
            }
            (&Method::DELETE, [id]) => {
                self.admin(&req)?;
                self.services.modules.delete(id)?;
                Ok(no_content())
            }
            (&Method::PATCH, [id, "completion"]) => {
                let caller = self.caller(&req)?;
                let input: CompletionInput = read_json(req).await?;
                let detail = self.services.modules.set_completion(id, caller.id(), input.is_completed)?;
                Ok(ok(&ModuleDetailView::from(detail)))
            }
            _ => Ok(method_not_allowed()),
        }
    }

    async fn handle_contents(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, []) => {
                self.caller(&req)?;
                let filter: ModuleFilter = read_query(&req)?;
                let contents = self.services.modules.list_contents(filter.module_id.as_deref())?;
                Ok(ok(&contents.into_iter().map(ModuleContentView::from).collect::<Vec<_>>()))
            }
            (&Method::POST, []) => {
                self.admin(&req)?;
                let content = self.services.modules.create_content(read_json(req).await?)?;
                Ok(created(&ModuleContentView::from(content)))
            }
            (&Method::GET, [id]) => {
                self.caller(&req)?;
                Ok(ok(&ModuleContentView::from(self.services.modules.get_content(id)?)))
            }
            (&Method::PATCH, [id]) => {
                self.admin(&req)?;
                let content = self.services.modules.update_content(id, read_json(req).await?)?;
                Ok(ok(&ModuleContentView::from(content)))
            }
            (&Method::DELETE, [id]) => {
                self.admin(&req)?;
                self.services.modules.delete_content(id)?;
                Ok(no_content())
            }
            _ => Ok(method_not_allowed()),
        }
    }

    // =========================================================================
    // Challenges & questions
    // =========================================================================

    async fn handle_challenges(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        match (method, rest) {
            (&Method::GET, []) => {
                self.admin(&req)?;
                let filter: TrailFilter = read_query(&req)?;
                let challenges = self.services.challenges.list(filter.trail_id.as_deref())?;
                Ok(ok(&challenges.into_iter().map(ChallengeView::from).collect::<Vec<_>>()))
            }
            (&Method::POST, []) => {
                self.admin(&req)?;
                let challenge = self.services.challenges.create(read_json(req).await?)?;
                let detail = self.services.challenges.get(&challenge.id)?;
                Ok(created(&ChallengeView::from(detail)))
            }
            (&Method::GET, [id]) => {
                self.admin(&req)?;
                Ok(ok(&ChallengeView::from(self.services.challenges.get(id)?)))
            }
            (&Method::DELETE, [id]) => {
                self.admin(&req)?;
                self.services.challenges.delete(id)?;
                Ok(no_content())
            }
            (&Method::GET, [id, "respond"]) => {
                self.caller(&req)?;
                Ok(ok(&ChallengeToRespondView::from(self.services.challenges.get(id)?)))
            }
            (&Method::POST, [id, "respond"]) => {
                let caller = self.caller(&req)?;
                let result = self.services.challenges.respond(id, caller.id(), read_json(req).await?)?;
                Ok(ok(&ChallengeResultView::from(result)))
            }
            _ => Ok(method_not_allowed()),
        }
    }

    async fn handle_questions(&self, req: Request<Incoming>, method: &Method, rest: &[&str]) -> HandlerResult {
        self.admin(&req)?;

        match (method, rest) {
            (&Method::POST, []) => {
                let question = self.services.challenges.create_question(read_json(req).await?)?;
                Ok(created(&QuestionView::from(question)))
            }
            (&Method::GET, [id]) => Ok(ok(&QuestionView::from(self.services.challenges.get_question(id)?))),
            (&Method::PATCH, [id]) => {
                let question = self.services.challenges.update_question(id, read_json(req).await?)?;
                Ok(ok(&QuestionView::from(question)))
            }
            (&Method::DELETE, [id]) => {
                self.services.challenges.delete_question(id)?;
                Ok(no_content())
            }
            _ => Ok(method_not_allowed()),
        }
    }
}

/// Read and deserialize a JSON request body
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, TrailError> {
    let body = req
        .collect()
        .await
        .map_err(|e| TrailError::InvalidInput(format!("Failed to read body: {}", e)))?
        .to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

/// Deserialize the query string
fn read_query<T: DeserializeOwned>(req: &Request<Incoming>) -> Result<T, TrailError> {
    parse_query(req.uri().query().unwrap_or(""))
}

fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, TrailError> {
    serde_urlencoded::from_str(query).map_err(|e| TrailError::InvalidInput(format!("Invalid query string: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_filters() {
        let filter: TrailFilter = parse_query("trailId=abc").unwrap();
        assert_eq!(filter.trail_id.as_deref(), Some("abc"));

        let empty: CategoryFilter = parse_query("").unwrap();
        assert!(empty.category_id.is_none());
    }

    #[test]
    fn test_cors_origin_validation() {
        let db = Arc::new(crate::db::LearningDb::open_in_memory().unwrap());
        let services = Arc::new(Services::new(db, &crate::config::Config::default()));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        assert!(HttpServer::new(services.clone(), addr).with_cors_origin("https://app.example.com").is_ok());
        assert!(HttpServer::new(services, addr).with_cors_origin("bad\norigin").is_err());
    }
}
