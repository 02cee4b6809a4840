use super::{parse_args, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use parley_types::ToolEnvelope;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Current conditions from Open-Meteo.
pub struct GetWeatherTool {
    client: Client,
    base_url: String,
}

impl GetWeatherTool {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, args: &WeatherArgs) -> Result<Current, reqwest::Error> {
        let forecast: Forecast = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", args.latitude.to_string()),
                ("longitude", args.longitude.to_string()),
                ("current", "temperature_2m,weathercode".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(forecast.current)
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature_2m: f64,
    weathercode: i64,
}

/// Short spoken description of a WMO weather code.
fn describe(code: i64) -> &'static str {
    match code {
        0 => "clear skies",
        1 => "mostly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        51 => "light drizzle",
        61 => "rain",
        71 => "snow",
        95 => "thunderstorm",
        _ => "unknown conditions",
    }
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather using latitude and longitude. Returns temperature and a short, human-friendly condition description."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": {"type": "number"},
                "longitude": {"type": "number"}
            },
            "required": ["latitude", "longitude"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: Value) -> Result<ToolEnvelope, ToolError> {
        let args: WeatherArgs = parse_args(self.name(), args)?;
        let current = match self.fetch(&args).await {
            Ok(current) => current,
            Err(e) => return Ok(ToolEnvelope::error(format!("Could not get weather: {e}"))),
        };

        let temperature = current.temperature_2m;
        let condition = describe(current.weathercode);
        Ok(ToolEnvelope::success()
            .with(
                "weather",
                json!({"temperature": temperature, "condition": condition}),
            )
            .spoken(format!(
                "Hmm, it's about {temperature}°C with {condition} right now."
            )))
    }
}
