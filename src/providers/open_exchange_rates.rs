use crate::core::rates::{ProviderError, RateProvider, RateTable};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches the latest rate table from an openexchangerates.org style endpoint.
pub struct OpenExchangeRatesProvider {
    base_url: String,
    app_id: String,
    client: reqwest::Client,
}

impl OpenExchangeRatesProvider {
    pub fn new(base_url: &str, app_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fxconv/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(OpenExchangeRatesProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    base: Option<String>,
    rates: HashMap<String, serde_json::Number>,
}

/// Reads the textual form of a JSON number into a decimal. Exponent notation is
/// accepted.
fn parse_rate(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[async_trait]
impl RateProvider for OpenExchangeRatesProvider {
    fn name(&self) -> &str {
        "openexchangerates"
    }

    #[instrument(name = "OxrRatesFetch", skip(self))]
    async fn fetch(&self) -> Result<RateTable, ProviderError> {
        let url = format!("{}/api/latest.json?app_id={}", self.base_url, self.app_id);
        debug!("Requesting latest rates from {}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Request error: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to read response: {e}")))?;

        let data: LatestRatesResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse JSON response: {e}")))?;

        let mut rates = HashMap::with_capacity(data.rates.len());
        for (code, raw) in data.rates {
            let rate = parse_rate(&raw.to_string()).ok_or_else(|| {
                ProviderError::Malformed(format!("Invalid rate {raw} for {code}"))
            })?;
            rates.insert(code, rate);
        }

        debug!(
            base = data.base.as_deref().unwrap_or("unknown"),
            count = rates.len(),
            "Received rate table"
        );
        RateTable::new(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/latest.json"))
            .and(query_param("app_id", "test-app"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> OpenExchangeRatesProvider {
        OpenExchangeRatesProvider::new(&server.uri(), "test-app", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_response = r#"{
            "disclaimer": "Usage subject to terms",
            "timestamp": 1700000000,
            "base": "USD",
            "rates": {
                "USD": 1,
                "EUR": 0.85,
                "JPY": 149.523,
                "BTC": 2.7e-5
            }
        }"#;
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(mock_response)).await;

        let table = provider(&server).fetch().await.unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.rate("USD"), Some(dec!(1)));
        assert_eq!(table.rate("EUR"), Some(dec!(0.85)));
        assert_eq!(table.rate("JPY"), Some(dec!(149.523)));
        assert_eq!(table.rate("BTC"), Some(dec!(0.000027)));
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let server = create_mock_server(ResponseTemplate::new(500)).await;

        let result = provider(&server).fetch().await;
        assert_eq!(
            result.unwrap_err(),
            ProviderError::Unavailable("HTTP error: 500 Internal Server Error".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_response = r#"{"base": "USD", "quotes": {"EUR": 0.85}}"#;
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(mock_response)).await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(err.to_string().contains("Failed to parse JSON response"));
    }

    #[tokio::test]
    async fn test_non_numeric_rate_is_malformed() {
        let mock_response = r#"{"rates": {"EUR": "0.85"}}"#;
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(mock_response)).await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_malformed() {
        let mock_response = r#"{"rates": {"USD": 1, "EUR": 0}}"#;
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(mock_response)).await;

        let err = provider(&server).fetch().await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Malformed("non-positive rate 0 for EUR".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        // Nothing listens on the discard port
        let provider =
            OpenExchangeRatesProvider::new("http://127.0.0.1:9", "test-app", Duration::from_secs(1))
                .unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn test_parse_rate_forms() {
        assert_eq!(parse_rate("0.85"), Some(dec!(0.85)));
        assert_eq!(parse_rate("1e-7"), Some(dec!(0.0000001)));
        assert_eq!(parse_rate("abc"), None);
    }
}
