//! Latest macroeconomic indicators from the Banco Central SGS API.
//!
//! Every series is requested on its own thread. A failing series is logged
//! and reported as `None`; the rest of the batch is unaffected.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::FetchError;

pub const SGS_BASE_URL: &str = "https://api.bcb.gov.br/dados/serie";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub const INFLATION: &str = "TaxaInflacao";
pub const INTEREST_RATE: &str = "TaxaJuros";
pub const GDP: &str = "PIB";
pub const UNEMPLOYMENT: &str = "TaxaDesemprego";

/// Indicator name and SGS series code.
pub const DEFAULT_SERIES: &[(&str, u32)] = &[
    (INFLATION, 13522),
    (INTEREST_RATE, 432),
    (GDP, 24368),
    (UNEMPLOYMENT, 24369),
];

pub trait SeriesSource {
    fn latest(&self, code: u32) -> Result<f64, FetchError>;
}

/// Indicator name to latest value; `None` when the series could not be fetched.
pub type IndicatorSnapshot = BTreeMap<String, Option<f64>>;

pub struct SgsClient {
    client: Client,
    base_url: String,
}

impl SgsClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(SGS_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn series_url(&self, code: u32) -> String {
        format!(
            "{}/bcdata.sgs.{code}/dados/ultimos/1?formato=json",
            self.base_url
        )
    }
}

impl SeriesSource for SgsClient {
    fn latest(&self, code: u32) -> Result<f64, FetchError> {
        let response = self.client.get(self.series_url(code)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: Value = response.json()?;
        parse_latest_value(&body)
    }
}

/// Reads `valor` from the last observation. SGS sends it as a string, but a
/// bare number is accepted too.
pub fn parse_latest_value(body: &Value) -> Result<f64, FetchError> {
    let last = body
        .as_array()
        .ok_or_else(|| FetchError::Malformed("expected a JSON array".into()))?
        .last()
        .ok_or_else(|| FetchError::Malformed("no observations".into()))?;
    match last.get("valor") {
        Some(Value::String(text)) => text
            .trim()
            .parse()
            .map_err(|_| FetchError::Malformed(format!("'{text}' is not a number"))),
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| FetchError::Malformed(format!("{number} is out of range"))),
        Some(other) => Err(FetchError::Malformed(format!("unexpected valor {other}"))),
        None => Err(FetchError::Malformed("missing 'valor' field".into())),
    }
}

pub fn fetch_indicators<S>(source: &S, series: &[(&str, u32)]) -> IndicatorSnapshot
where
    S: SeriesSource + Sync,
{
    info!(series = series.len(), "fetching macroeconomic indicators");
    std::thread::scope(|scope| {
        let handles: Vec<_> = series
            .iter()
            .map(|&(name, code)| (name, code, scope.spawn(move || source.latest(code))))
            .collect();

        handles
            .into_iter()
            .map(|(name, code, handle)| {
                let value = match handle.join() {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(err)) => {
                        warn!(indicator = name, code, %err, "indicator unavailable");
                        None
                    }
                    Err(_) => {
                        warn!(indicator = name, code, "indicator fetch panicked");
                        None
                    }
                };
                (name.to_string(), value)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    struct Canned;

    impl SeriesSource for Canned {
        fn latest(&self, code: u32) -> Result<f64, FetchError> {
            match code {
                24368 => Err(FetchError::Status(503)),
                other => Ok(f64::from(other) / 1000.0),
            }
        }
    }

    #[test]
    fn valor_is_read_from_the_last_observation() {
        let body = json!([
            {"data": "01/08/2025", "valor": "4.10"},
            {"data": "01/09/2025", "valor": "4.25"}
        ]);
        assert_eq!(parse_latest_value(&body).unwrap(), 4.25);
        assert_eq!(parse_latest_value(&json!([{"valor": 10.5}])).unwrap(), 10.5);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for body in [
            json!([]),
            json!({"valor": "1"}),
            json!([{"data": "01/09/2025"}]),
            json!([{"valor": "n/a"}]),
            json!([{"valor": null}]),
        ] {
            assert!(matches!(
                parse_latest_value(&body),
                Err(FetchError::Malformed(_))
            ));
        }
    }

    #[test]
    fn one_failing_series_leaves_the_others_intact() {
        let snapshot = fetch_indicators(&Canned, DEFAULT_SERIES);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[GDP], None);
        assert_eq!(snapshot[INFLATION], Some(13.522));
        assert_eq!(snapshot[INTEREST_RATE], Some(0.432));
        assert_eq!(snapshot[UNEMPLOYMENT], Some(24.369));
    }

    /// Answers `requests` HTTP requests, failing the one for series 24368.
    fn serve(requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut request_line = String::new();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    if header == "\r\n" || header.is_empty() {
                        break;
                    }
                }

                let (status, body) = if request_line.contains("bcdata.sgs.24368/") {
                    ("500 Internal Server Error", String::from("oops"))
                } else {
                    ("200 OK", String::from(r#"[{"data":"01/09/2025","valor":"7.5"}]"#))
                };
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
        });
        format!("http://{addr}/dados/serie")
    }

    #[test]
    fn http_error_status_degrades_to_none() {
        let base = serve(4);
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .unwrap();
        let client = SgsClient::with_client(http, &base);
        let snapshot = fetch_indicators(&client, DEFAULT_SERIES);

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[GDP], None);
        for name in [INFLATION, INTEREST_RATE, UNEMPLOYMENT] {
            assert_eq!(snapshot[name], Some(7.5));
        }
    }

    #[test]
    fn series_url_follows_sgs_layout() {
        let client = SgsClient::new().unwrap();
        assert_eq!(
            client.series_url(432),
            "https://api.bcb.gov.br/dados/serie/bcdata.sgs.432/dados/ultimos/1?formato=json"
        );
    }
}
