use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use composer::serve::STATUS_NOT_FOUND;
use composer::{Index, Responder};
use log::{debug, error};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::consts::PORT;
use crate::server_utils::{LogResponse, bind_listener, print_banner, shutdown_requested};

pub async fn start_server(index: Index, host: bool, port: Option<u16>) -> io::Result<()> {
    let start_time = Instant::now();

    // run it with hyper, if --host 0.0.0.0 otherwise localhost
    let addr = if host {
        IpAddr::from([0, 0, 0, 0])
    } else {
        IpAddr::from([127, 0, 0, 1])
    };

    let listener = bind_listener(addr, port, PORT).await?;
    let local_addr = listener.local_addr()?;

    debug!(target: "server", "listening on {}", local_addr);

    let router = Router::new()
        .fallback(handle_request)
        .with_state(Arc::new(index))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(LogResponse),
        );

    print_banner(start_time, host, local_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_requested())
        .await
}

async fn handle_request(State(index): State<Arc<Index>>, uri: Uri) -> Response {
    let path = uri.path().to_string();

    // Rendering reads files and runs filters synchronously.
    let rendered =
        tokio::task::spawn_blocking(move || Responder::new(&index).respond(&path)).await;

    let mut response = match rendered {
        Ok(rendered) if rendered.status == STATUS_NOT_FOUND => not_found(),
        Ok(rendered) => (
            StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            [(header::CONTENT_TYPE, rendered.content_type)],
            rendered.body,
        )
            .into_response(),
        Err(err) => {
            error!(target: "server", "Request handler panicked: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    response.extensions_mut().insert(uri);
    response
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        include_str!("404.html"),
    )
        .into_response()
}
