// Hand-crafted async HTTP client for the Courtly reservation service.
//
// Base path: /api/v1/
// Auth: `Authorization: Bearer <token>` header

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::types::{
    Court, CourtId, NewReservation, ReservationFilter, ReservationId, ReservationRecord,
    ServiceHealth,
};

// ── Error response shape from the service ────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Courtly reservation service.
///
/// Communicates via JSON REST endpoints under `/api/v1/`. This is the
/// Reservation Store the availability engine reads from; the matching
/// change feed lives in [`crate::feed`].
pub struct BookingClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl BookingClient {
    // ── Constructor ──────────────────────────────────────────────────

    /// Build from a service URL, an optional bearer token, and transport
    /// settings.
    ///
    /// The token is injected as a default `Authorization` header on every
    /// request and marked sensitive so it never appears in logs.
    pub fn new(
        base_url: &str,
        token: Option<&secrecy::SecretString>,
        transport: &crate::TransportConfig,
    ) -> Result<Self, Error> {
        let http = match token {
            Some(token) => {
                let mut headers = HeaderMap::new();
                let mut value = HeaderValue::from_str(&format!(
                    "Bearer {}",
                    token.expose_secret()
                ))
                .map_err(|e| Error::Unauthorized {
                    message: format!("invalid bearer token header value: {e}"),
                })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                transport.build_client_with_headers(headers)?
            }
            None => transport.build_client()?,
        };

        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Normalize the base URL so it always ends with `/api/v1/`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;

        // Strip trailing slash for uniform handling
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/api/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/v1/"));
        }

        Ok(url)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Join a relative path (e.g. `"courts"`) onto the base URL.
    fn url(&self, path: &str) -> Url {
        // base_url always ends with `/api/v1/`, so joining `courts` works.
        self.base_url
            .join(path)
            .expect("path should be valid relative URL")
    }

    /// The WebSocket URL of the change feed matching this client's base.
    ///
    /// `https://host/api/v1/` becomes `wss://host/api/v1/feed`.
    pub fn feed_url(&self) -> Result<Url, Error> {
        let mut url = self.url("feed");
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(Error::FeedConnect(format!(
                    "cannot derive feed URL from {other}:// base"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::FeedConnect("feed URL scheme rejected".to_owned()))?;
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url}");

        let resp = self.send(self.http.get(url)).await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url} params={params:?}");

        let resp = self.send(self.http.get(url).query(params)).await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path);
        debug!("POST {url}");

        let resp = self.send(self.http.post(url).json(body)).await?;
        self.handle_response(resp).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        debug!("POST {url}");

        let resp = self.send(self.http.post(url)).await?;
        self.handle_response(resp).await
    }

    /// Dispatch a request, mapping reqwest timeouts to [`Error::Timeout`].
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                Error::Transport(e)
            }
        })
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        let (message, code) = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(err) => (err.error.unwrap_or_else(|| status.to_string()), err.code),
            Err(_) => (
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                None,
            ),
        };

        match status {
            reqwest::StatusCode::UNAUTHORIZED => Error::Unauthorized { message },
            reqwest::StatusCode::FORBIDDEN => Error::Forbidden { message },
            reqwest::StatusCode::NOT_FOUND => Error::NotFound { message },
            reqwest::StatusCode::CONFLICT => Error::Conflict { message },
            _ => Error::Service {
                status: status.as_u16(),
                message,
                code,
            },
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Health ───────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<ServiceHealth, Error> {
        self.get("health").await
    }

    // ── Courts ───────────────────────────────────────────────────────

    pub async fn list_courts(&self) -> Result<Vec<Court>, Error> {
        self.get("courts").await
    }

    pub async fn get_court(&self, id: CourtId) -> Result<Court, Error> {
        self.get(&format!("courts/{id}")).await
    }

    // ── Reservations ─────────────────────────────────────────────────

    pub async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<ReservationRecord>, Error> {
        self.get_with_params("reservations", &filter.to_params())
            .await
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<ReservationRecord, Error> {
        self.get(&format!("reservations/{id}")).await
    }

    /// The confirmed reservations occupying a (court, date) pair.
    ///
    /// This is the read the slot-derivation pipeline depends on; the
    /// service does the court/date/status filtering so callers get
    /// exactly the records that block slots.
    pub async fn fetch_confirmed(
        &self,
        court: CourtId,
        date: chrono::NaiveDate,
    ) -> Result<Vec<ReservationRecord>, Error> {
        self.list_reservations(&ReservationFilter::confirmed_for(court, date))
            .await
    }

    /// Create a reservation.
    ///
    /// The service enforces slot uniqueness: losing a race for a slot
    /// surfaces as [`Error::Conflict`].
    pub async fn create_reservation(
        &self,
        body: &NewReservation,
    ) -> Result<ReservationRecord, Error> {
        self.post("reservations", body).await
    }

    pub async fn cancel_reservation(
        &self,
        id: ReservationId,
    ) -> Result<ReservationRecord, Error> {
        self.post_empty(&format!("reservations/{id}/cancel")).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> BookingClient {
        BookingClient::new(base, None, &crate::TransportConfig::default()).unwrap()
    }

    #[test]
    fn base_url_gains_api_prefix() {
        let c = client("https://booking.example.com");
        assert_eq!(c.base_url.as_str(), "https://booking.example.com/api/v1/");
    }

    #[test]
    fn base_url_keeps_existing_prefix() {
        let c = client("https://booking.example.com/api/v1/");
        assert_eq!(c.base_url.as_str(), "https://booking.example.com/api/v1/");
    }

    #[test]
    fn feed_url_swaps_scheme() {
        let c = client("https://booking.example.com");
        assert_eq!(
            c.feed_url().unwrap().as_str(),
            "wss://booking.example.com/api/v1/feed"
        );

        let plain = client("http://127.0.0.1:8080");
        assert_eq!(
            plain.feed_url().unwrap().as_str(),
            "ws://127.0.0.1:8080/api/v1/feed"
        );
    }
}
