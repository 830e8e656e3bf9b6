use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use log::{error, info};
use std::net::SocketAddr;

use crate::data::{SolveOutput, SolveRequest};
use crate::sink::{CancellationToken, FileSink};
use crate::solver;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

async fn solve_handler(
    Json(request): Json<SolveRequest>,
) -> Result<Json<SolveOutput>, (StatusCode, String)> {
    let best_file = std::env::var_os("TIMETABLE_BEST_FILE");
    // the search is CPU-bound and runs for up to the whole time limit
    let result = tokio::task::spawn_blocking(move || match best_file {
        Some(path) => solver::solve_with(
            &request.problem,
            &request.config,
            FileSink::new(path),
            CancellationToken::new(),
        ),
        None => solver::solve(&request.problem, &request.config),
    })
    .await;
    match result {
        Ok(Ok(output)) => Ok(Json(output)),
        Ok(Err(e)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!("Solver task failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "solver task failed".to_string()))
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/v1/timetable/solve", post(solve_handler))
}

/// Bind address from `TIMETABLE_ADDR`, falling back to [`DEFAULT_ADDR`].
pub fn bind_addr() -> Result<SocketAddr, String> {
    let addr = std::env::var("TIMETABLE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    addr.parse()
        .map_err(|e| format!("Invalid TIMETABLE_ADDR {addr:?}: {e}"))
}

pub async fn run_server() -> Result<(), String> {
    let addr = bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Could not bind {addr}: {e}"))?;

    info!("Server running at http://{}", addr);

    axum::serve(listener, router())
        .await
        .map_err(|e| format!("Server error: {e}"))
}
