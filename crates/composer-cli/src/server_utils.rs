use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{StatusCode, Uri},
    response::Response,
};
use colored::{ColoredString, Colorize};
use composer::logging::{FormatElapsedTimeOptions, format_elapsed_time};
use local_ip_address::local_ip;
use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::OnResponse;
use tracing::Span;

/// Binds `requested`, or the first free port from `first` upwards when no port was asked for.
pub async fn bind_listener(ip: IpAddr, requested: Option<u16>, first: u16) -> io::Result<TcpListener> {
    if let Some(port) = requested {
        return TcpListener::bind(SocketAddr::new(ip, port)).await;
    }

    let mut port = first;
    loop {
        match TcpListener::bind(SocketAddr::new(ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse && port < u16::MAX => {
                debug!(target: "server", "port {port} is taken");
                port += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn hyperlink(url: &str) -> String {
    format!("\x1b]8;;{url}\x1b\\{url}\x1b]8;;\x1b\\")
}

pub fn print_banner(started: Instant, host: bool, addr: SocketAddr) {
    let elapsed = format_elapsed_time(started.elapsed(), &FormatElapsedTimeOptions::default());
    let port = addr.port();

    let local = hyperlink(&format!("http://localhost:{port}")).bold().underline().bright_blue();
    let network = match (host, local_ip()) {
        (false, _) => "pass --host to listen on all interfaces".dimmed(),
        (true, Ok(ip)) => hyperlink(&format!("http://{ip}:{port}")).bold().underline().bright_magenta(),
        (true, Err(err)) => format!("no local network address: {err}").dimmed(),
    };

    info!(target: "SKIP_FORMAT", "");
    info!(target: "SKIP_FORMAT", "{} {}", "composer".bold().bright_cyan(), format!("ready in {elapsed}"));
    info!(target: "SKIP_FORMAT", "");
    info!(target: "SKIP_FORMAT", "  {:<9}{local}", "Local".bold());
    info!(target: "SKIP_FORMAT", "  {:<9}{network}", "Network".bold());
    info!(target: "SKIP_FORMAT", "");
}

/// Colors a final status by class. Informational statuses are not logged.
fn status_label(status: StatusCode) -> Option<ColoredString> {
    let text = status.as_u16().to_string();
    match status.as_u16() {
        100..=199 => None,
        500.. => Some(text.red().bold()),
        400..=499 => Some(text.yellow()),
        300..=399 => Some(text.cyan()),
        _ => Some(text.green()),
    }
}

/// Logs one line per response with its status, path and latency.
///
/// The path comes from the [`Uri`] extension set by the request handler.
#[derive(Clone, Debug)]
pub struct LogResponse;

impl OnResponse<Body> for LogResponse {
    fn on_response(self, response: &Response<Body>, latency: Duration, _span: &Span) {
        let Some(status) = status_label(response.status()) else {
            return;
        };
        let path = response
            .extensions()
            .get::<Uri>()
            .map_or("?", Uri::path);
        let latency = format_elapsed_time(latency, &FormatElapsedTimeOptions::default());

        info!(target: "server", "{status} {} {}", path.bold(), latency.dimmed());
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_requested() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(target: "server", "Ctrl+C will not stop the server: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target: "server", "SIGTERM will not stop the server: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }

    info!(target: "server", "shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_listener_skips_taken_ports() {
        let ip = IpAddr::from([127, 0, 0, 1]);
        let taken = TcpListener::bind(SocketAddr::new(ip, 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let listener = bind_listener(ip, None, port).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_bind_listener_requested_port_is_strict() {
        let ip = IpAddr::from([127, 0, 0, 1]);
        let taken = TcpListener::bind(SocketAddr::new(ip, 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_listener(ip, Some(port), port).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn test_status_label() {
        assert!(status_label(StatusCode::CONTINUE).is_none());
        assert!(status_label(StatusCode::SWITCHING_PROTOCOLS).is_none());

        let label = status_label(StatusCode::NOT_FOUND).unwrap();
        assert_eq!(label.input, "404");
        assert_eq!(status_label(StatusCode::OK).unwrap().input, "200");
    }
}
