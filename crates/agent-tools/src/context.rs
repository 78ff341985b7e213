use reqwest::Client;

pub const GEOCODING_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";
pub const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWeatherEndpoints {
    pub geocoding: String,
    pub forecast: String,
}

impl Default for OpenWeatherEndpoints {
    fn default() -> Self {
        Self {
            geocoding: GEOCODING_URL.to_string(),
            forecast: FORECAST_URL.to_string(),
        }
    }
}

impl OpenWeatherEndpoints {
    /// Both endpoints under one host, with the public API's paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            geocoding: format!("{base}/geo/1.0/direct"),
            forecast: format!("{base}/data/2.5/forecast"),
        }
    }
}

/// Resources shared by every tool invocation of one run.
///
/// Built once before the run and only lent out by reference afterwards; there
/// is no way to change it once constructed. `reqwest::Client` is safe to use
/// from concurrent invocations and releases its connection pool when the last
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct DependencyContext {
    credential: Option<String>,
    http_client: Client,
    endpoints: OpenWeatherEndpoints,
}

impl DependencyContext {
    pub fn new(credential: Option<String>) -> Self {
        Self::with_client(credential, Client::new())
    }

    pub fn with_client(credential: Option<String>, http_client: Client) -> Self {
        Self {
            credential: credential.filter(|key| !key.trim().is_empty()),
            http_client,
            endpoints: OpenWeatherEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: OpenWeatherEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn endpoints(&self) -> &OpenWeatherEndpoints {
        &self.endpoints
    }
}
