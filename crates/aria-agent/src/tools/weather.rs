//! Weather tools backed by WeatherAPI.com.
//!
//! Provides `get_weather` (current conditions) and `get_forecast` (up to
//! three days, the free-tier maximum).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value, json};
use std::sync::Arc;
use std::time::Duration;

use aria_llm::{ParamSpec, ParamType, ToolSpec};

use crate::error::{AgentError, Result};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolRegistry};

/// Default WeatherAPI base URL.
pub const DEFAULT_WEATHER_BASE: &str = "http://api.weatherapi.com/v1";

/// Largest forecast the provider serves on the free tier.
pub const MAX_FORECAST_DAYS: i64 = 3;

/// Output returned by every call when no API key is available.
pub const KEY_NOT_CONFIGURED: &str =
    "WEATHER_API_KEY not configured. Add it to your environment or .env file.";

/// Whether a key is missing or still the `.env` template value.
pub fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || (key.starts_with("your_") && key.ends_with("_here"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration / Client
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the weather tools.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// API key; `None` makes every call report that the key is missing.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_WEATHER_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl WeatherConfig {
    /// Create a config with the given key. Placeholder keys count as missing.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !is_placeholder_key(k)),
            ..Self::default()
        }
    }

    /// Read the key from `WEATHER_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("WEATHER_API_KEY").ok())
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
enum FetchError {
    Status(u16),
    Transport(String),
}

/// HTTP client shared by both weather tools.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    config: WeatherConfig,
}

impl WeatherClient {
    /// Create a client for the given configuration.
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref()
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        api_key: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);

        tracing::debug!(endpoint, "Fetching weather data");

        let response = self
            .client
            .get(&url)
            .query(&[("key", api_key)])
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "Weather API returned error");
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Transport(format!("invalid response: {}", e)))
    }
}

fn transport_error(e: &str) -> ToolOutput {
    ToolOutput::error(format!("Error fetching weather: {}", e))
}

fn city_arg(args: &Value) -> &str {
    args.get("city").and_then(Value::as_str).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: Number,
    temp_f: Number,
    condition: Condition,
    humidity: Number,
    wind_kph: Number,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    location: Location,
    forecast: Forecast,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: String,
    day: DaySummary,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    maxtemp_c: Number,
    mintemp_c: Number,
    condition: Condition,
    #[serde(default)]
    daily_chance_of_rain: Value,
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "0".to_string(),
        other => other.to_string(),
    }
}

fn format_current(data: &CurrentResponse) -> String {
    format!(
        "Weather for {}, {}:\n🌡️ Temperature: {}°C ({}°F)\n☁️ Condition: {}\n💧 Humidity: {}%\n💨 Wind: {} km/h",
        data.location.name,
        data.location.country,
        data.current.temp_c,
        data.current.temp_f,
        data.current.condition.text,
        data.current.humidity,
        data.current.wind_kph,
    )
}

fn format_forecast(data: &ForecastResponse, days: i64) -> String {
    let mut out = format!(
        "📅 {}-Day Forecast for {}, {}:\n\n",
        days, data.location.name, data.location.country
    );
    for day in &data.forecast.forecastday {
        out.push_str(&format!("**{}**\n", day.date));
        out.push_str(&format!(
            "  🌡️ {}°C - {}°C\n",
            day.day.mintemp_c, day.day.maxtemp_c
        ));
        out.push_str(&format!("  ☁️ {}\n", day.day.condition.text));
        out.push_str(&format!(
            "  🌧️ Rain chance: {}%\n\n",
            plain(&day.day.daily_chance_of_rain)
        ));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Current Weather Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool returning current conditions for a city.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: WeatherClient,
}

impl WeatherTool {
    /// Create the tool over a shared client.
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_weather",
            "Get the current weather for a city. Provides temperature, conditions, humidity, and wind speed.",
        )
        .with_param(ParamSpec::required(
            "city",
            ParamType::String,
            "The city name (e.g., 'London', 'Tokyo', 'New York')",
        ))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(api_key) = self.client.api_key() else {
            return Ok(ToolOutput::error(KEY_NOT_CONFIGURED));
        };
        let city = city_arg(&args);

        tracing::info!(tool = "get_weather", city, call_id = %ctx.call_id, "Looking up weather");

        let query = [("q", city.to_string()), ("aqi", "no".to_string())];
        let output = match self
            .client
            .fetch::<CurrentResponse>("current.json", api_key, &query)
            .await
        {
            Ok(data) => ToolOutput::text(format_current(&data)),
            Err(FetchError::Status(400)) => ToolOutput::error(format!(
                "Could not find weather for '{}'. Please check the city name.",
                city
            )),
            Err(FetchError::Status(status)) => {
                ToolOutput::error(format!("Weather API error: HTTP {}", status))
            }
            Err(FetchError::Transport(e)) => transport_error(&e),
        };
        Ok(output)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forecast Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool returning a short daily forecast for a city.
#[derive(Debug, Clone)]
pub struct ForecastTool {
    client: WeatherClient,
}

impl ForecastTool {
    /// Create the tool over a shared client.
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ForecastTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_forecast",
            "Get the weather forecast for the next 3 days for a city.",
        )
        .with_param(ParamSpec::required(
            "city",
            ParamType::String,
            "The city name",
        ))
        .with_param(ParamSpec::optional(
            "days",
            ParamType::Integer,
            "Number of days (1-3)",
            Some(json!(MAX_FORECAST_DAYS)),
        ))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(api_key) = self.client.api_key() else {
            return Ok(ToolOutput::error(KEY_NOT_CONFIGURED));
        };
        let city = city_arg(&args);
        let days = args
            .get("days")
            .and_then(Value::as_i64)
            .unwrap_or(MAX_FORECAST_DAYS)
            .clamp(1, MAX_FORECAST_DAYS);

        tracing::info!(tool = "get_forecast", city, days, call_id = %ctx.call_id, "Looking up forecast");

        let query = [
            ("q", city.to_string()),
            ("days", days.to_string()),
            ("aqi", "no".to_string()),
        ];
        let output = match self
            .client
            .fetch::<ForecastResponse>("forecast.json", api_key, &query)
            .await
        {
            Ok(data) => ToolOutput::text(format_forecast(&data, days)),
            Err(FetchError::Status(400)) => {
                ToolOutput::error(format!("Could not find forecast for '{}'.", city))
            }
            Err(FetchError::Status(status)) => {
                ToolOutput::error(format!("Weather API error: HTTP {}", status))
            }
            Err(FetchError::Transport(e)) => transport_error(&e),
        };
        Ok(output)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Both weather tools over one shared client.
pub fn weather_tools(config: WeatherConfig) -> Result<Vec<Arc<dyn Tool>>> {
    let client = WeatherClient::new(config)?;
    Ok(vec![
        Arc::new(WeatherTool::new(client.clone())),
        Arc::new(ForecastTool::new(client)),
    ])
}

/// Register `get_weather` and `get_forecast`.
pub fn register_weather_tools(registry: &mut ToolRegistry, config: WeatherConfig) -> Result<()> {
    if config.api_key.is_none() {
        tracing::warn!("WEATHER_API_KEY not configured; weather tools will report an error");
    }
    for tool in weather_tools(config)? {
        registry.register_arc(tool)?;
    }
    Ok(())
}
