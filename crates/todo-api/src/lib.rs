//! todo-api — REST API for the todo service and rollout controller.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/todos` | List all todos |
//! | POST | `/api/todos` | Create a todo |
//! | GET | `/api/todos/{id}` | Get a todo |
//! | PUT | `/api/todos/{id}` | Update a todo |
//! | DELETE | `/api/todos/{id}` | Delete a todo |
//! | POST | `/api/deployments` | Start a canary deployment |
//! | GET | `/api/deployments/{id}` | Deployment status |
//! | POST | `/api/deployments/{id}/abort` | Abort a deployment |
//! | GET | `/healthz` | Liveness probe |
//!
//! Every response carries an `Access-Control-Allow-Origin` header resolved
//! against the configured allow-list; OPTIONS preflights short-circuit
//! to 204.

pub mod cors;
pub mod handlers;
pub mod rollout_handlers;

use axum::Router;
use axum::routing::{get, post};

use todo_rollout::{MetricSampler, RolloutController};
use todo_service::TodoService;

pub use cors::CorsConfig;

/// Shared state for todo handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: TodoService,
}

/// Shared state for rollout handlers.
pub struct RolloutApiState<S> {
    pub controller: RolloutController<S>,
}

impl<S> Clone for RolloutApiState<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

/// Build the complete API router (todo CRUD + rollout management + healthz).
pub fn build_router<S: MetricSampler>(
    service: TodoService,
    controller: RolloutController<S>,
    cors: CorsConfig,
) -> Router {
    let api_state = ApiState { service };
    let rollout_state = RolloutApiState { controller };

    let todo_routes = Router::new()
        .route(
            "/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/todos/{id}",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
        .with_state(api_state);

    let rollout_routes = Router::new()
        .route("/deployments", post(rollout_handlers::start_deployment::<S>))
        .route(
            "/deployments/{id}",
            get(rollout_handlers::get_deployment::<S>),
        )
        .route(
            "/deployments/{id}/abort",
            post(rollout_handlers::abort_deployment::<S>),
        )
        .with_state(rollout_state);

    Router::new()
        .nest("/api", todo_routes.merge(rollout_routes))
        .route("/healthz", get(handlers::healthz))
        .layer(axum::middleware::from_fn_with_state(
            cors,
            cors::cors_middleware,
        ))
}
