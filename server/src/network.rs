//! HTTP layer: a single poll endpoint in front of [`Game`].

use crate::clock::Clock;
use crate::game::Game;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, error, info};
use shared::RequestParams;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Path clients poll.
pub const POLL_PATH: &str = "/server";

#[derive(Clone)]
struct AppState {
    game: Arc<Game>,
    clock: Arc<dyn Clock>,
}

/// Builds the router serving [`POLL_PATH`] for GET (query string) and POST
/// (urlencoded form).
pub fn router(game: Arc<Game>, clock: Arc<dyn Clock>) -> Router {
    Router::new()
        .route(POLL_PATH, get(poll_query).post(poll_form))
        .with_state(AppState { game, clock })
}

async fn poll_query(
    State(state): State<AppState>,
    params: Result<Query<RequestParams>, QueryRejection>,
) -> Response {
    match params {
        Ok(Query(params)) => respond(&state, &params),
        Err(rejection) => bad_request(rejection.body_text()),
    }
}

async fn poll_form(
    State(state): State<AppState>,
    params: Result<Form<RequestParams>, FormRejection>,
) -> Response {
    match params {
        Ok(Form(params)) => respond(&state, &params),
        Err(rejection) => bad_request(rejection.body_text()),
    }
}

fn bad_request(reason: String) -> Response {
    debug!("rejected poll: {}", reason);
    StatusCode::BAD_REQUEST.into_response()
}

fn respond(state: &AppState, params: &RequestParams) -> Response {
    let now = state.clock.now();
    match state.game.handle(params, now) {
        Ok(snapshot) => (
            [(header::CONTENT_TYPE, "application/json")],
            snapshot.encode(),
        )
            .into_response(),
        Err(e) => {
            error!(
                "poll failed (command {}, packet {}): {}",
                params.command, params.packet_id, e
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Bound HTTP server, ready to run.
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    pub async fn bind(
        addr: &str,
        game: Arc<Game>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Server {
            listener,
            router: router(game, clock),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    /// Serves until `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
