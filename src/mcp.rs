//! MCP surface of the query layer: one tool per operation, the status
//! resources and the prompt templates.

use std::future::Future;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::prompts;
use crate::service::{QueryResult, WeatherService};
use crate::units::Units;

pub const API_STATUS_URI: &str = "weather://api/status";
pub const CACHE_STATS_URI: &str = "weather://cache/stats";
pub const UNITS_INFO_URI: &str = "weather://units/info";

const INSTRUCTIONS: &str = "\
Weather data from the OpenWeatherMap API.

Tools: get_current_weather, get_forecast, search_location, get_weather_by_zip, get_air_quality.

Responses for current weather and forecasts are cached (10 minutes by default). \
Units may be metric, imperial or standard. Upstream calls are counted against a \
daily budget (1000 calls/day on the free tier); see weather://api/status.";

fn default_true() -> bool {
    true
}

fn default_days() -> u32 {
    5
}

fn default_limit() -> u32 {
    5
}

fn default_country() -> String {
    "US".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CurrentWeatherArgs {
    /// City name (e.g. "London") or "lat,lon" coordinates
    pub location: String,
    /// Defaults to the server's configured units
    pub units: Option<Units>,
    /// Include humidity, pressure, wind, visibility, sunrise and sunset
    #[serde(default = "default_true")]
    pub include_details: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForecastArgs {
    /// City name or "lat,lon" coordinates
    pub location: String,
    /// Number of days, 1 to 5
    #[serde(default = "default_days")]
    pub days: u32,
    pub units: Option<Units>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Location name to search
    pub query: String,
    /// Maximum number of results, 1 to 5
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ZipArgs {
    pub zip_code: String,
    /// ISO 3166 country code
    #[serde(default = "default_country")]
    pub country_code: String,
    pub units: Option<Units>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AirQualityArgs {
    /// "lat,lon" coordinates or a place name to look up
    pub location: String,
}

/// Failures come back as tool errors carrying `{"error": ...}`.
fn tool_result(result: QueryResult) -> Result<CallToolResult, McpError> {
    let content = Content::json(&result)?;
    if result.is_success() {
        Ok(CallToolResult::success(vec![content]))
    } else {
        Ok(CallToolResult::error(vec![content]))
    }
}

fn json_resource(uri: &str, name: &str, description: &str) -> Resource {
    let mut raw = RawResource::new(uri, name.to_string());
    raw.description = Some(description.to_string());
    raw.mime_type = Some("application/json".to_string());
    raw.no_annotation()
}

fn prompt_argument(arguments: Option<JsonObject>, prompt: &str, key: &str) -> Result<String, McpError> {
    arguments
        .as_ref()
        .and_then(|args| args.get(key)?.as_str().map(str::to_string))
        .ok_or_else(|| McpError::invalid_params(format!("{} requires '{}'", prompt, key), None))
}

#[derive(Clone)]
pub struct WeatherMcp {
    service: Arc<WeatherService>,
    tool_router: ToolRouter<WeatherMcp>,
}

#[tool_router]
impl WeatherMcp {
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    fn default_units(&self) -> Units {
        self.service.config().default_units
    }

    #[tool(description = "Get current weather for a location (city name or \"lat,lon\").")]
    async fn get_current_weather(
        &self,
        Parameters(args): Parameters<CurrentWeatherArgs>,
    ) -> Result<CallToolResult, McpError> {
        let units = args.units.unwrap_or(self.default_units());
        tool_result(
            self.service
                .current_weather(&args.location, units, args.include_details)
                .await,
        )
    }

    #[tool(description = "Get a multi-day forecast in 3-hour steps, grouped by day (max 5 days).")]
    async fn get_forecast(
        &self,
        Parameters(args): Parameters<ForecastArgs>,
    ) -> Result<CallToolResult, McpError> {
        let units = args.units.unwrap_or(self.default_units());
        tool_result(self.service.forecast(&args.location, args.days, units).await)
    }

    #[tool(description = "Search for locations by name and return their coordinates.")]
    async fn search_location(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(self.service.search_location(&args.query, args.limit).await)
    }

    #[tool(description = "Get current weather by ZIP or postal code.")]
    async fn get_weather_by_zip(
        &self,
        Parameters(args): Parameters<ZipArgs>,
    ) -> Result<CallToolResult, McpError> {
        let units = args.units.unwrap_or(self.default_units());
        tool_result(
            self.service
                .weather_by_zip(&args.zip_code, &args.country_code, units)
                .await,
        )
    }

    #[tool(description = "Get the air quality index and pollutant concentrations for a location.")]
    async fn get_air_quality(
        &self,
        Parameters(args): Parameters<AirQualityArgs>,
    ) -> Result<CallToolResult, McpError> {
        tool_result(self.service.air_quality(&args.location).await)
    }

    #[tool(description = "Drop every cached response.")]
    async fn clear_cache(&self) -> Result<CallToolResult, McpError> {
        let cleared = self.service.clear_cache();
        Ok(CallToolResult::success(vec![Content::json(json!({
            "cleared": cleared
        }))?]))
    }
}

#[tool_handler]
impl ServerHandler for WeatherMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: self.service.config().server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                json_resource(API_STATUS_URI, "api_status", "API status and usage statistics"),
                json_resource(CACHE_STATS_URI, "cache_statistics", "Cache statistics"),
                json_resource(UNITS_INFO_URI, "units_info", "Information about available units"),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let body: Value = match uri.as_str() {
            API_STATUS_URI => self.service.api_status(),
            CACHE_STATS_URI => serde_json::to_value(self.service.cache_stats())
                .map_err(|e| McpError::internal_error(e.to_string(), None))?,
            UNITS_INFO_URI => self.service.units_info(),
            _ => {
                return Err(McpError::resource_not_found(
                    "resource_not_found",
                    Some(json!({"uri": uri})),
                ))
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(body.to_string(), uri)],
        })
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            next_cursor: None,
            prompts: vec![
                Prompt::new(
                    "weather_analysis",
                    Some("Generate a weather analysis prompt for a location"),
                    Some(vec![PromptArgument {
                        name: "location".to_string(),
                        description: Some("Location to analyze".to_string()),
                        required: Some(true),
                    }]),
                ),
                Prompt::new(
                    "travel_weather",
                    Some("Generate a travel weather comparison prompt"),
                    Some(vec![PromptArgument {
                        name: "destinations".to_string(),
                        description: Some("Destinations to compare".to_string()),
                        required: Some(true),
                    }]),
                ),
            ],
        })
    }

    async fn get_prompt(
        &self,
        GetPromptRequestParam { name, arguments }: GetPromptRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let text = match name.as_str() {
            "weather_analysis" => {
                prompts::weather_analysis(&prompt_argument(arguments, &name, "location")?)
            }
            "travel_weather" => {
                prompts::travel_weather(&prompt_argument(arguments, &name, "destinations")?)
            }
            _ => {
                return Err(McpError::invalid_params(
                    format!("Unknown prompt: {}", name),
                    None,
                ))
            }
        };

        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::Config;
    use rmcp::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(base: &str) -> Arc<WeatherService> {
        let mut config = Config::from_lookup(|key| match key {
            "API_KEY" => Some("test-key".to_string()),
            "DEFAULT_UNITS" => Some("imperial".to_string()),
            "SERVER_NAME" => Some("Test Weather".to_string()),
            _ => None,
        })
        .unwrap();
        config.base_url = format!("{}/data/2.5", base);
        config.geo_url = format!("{}/geo/1.0", base);
        Arc::new(WeatherService::from_config(config, Arc::new(SystemClock)).unwrap())
    }

    fn offline_handler() -> WeatherMcp {
        WeatherMcp::new(service_for("http://127.0.0.1:9"))
    }

    fn first_text(result: &impl serde::Serialize) -> Value {
        let value = serde_json::to_value(result).unwrap();
        let text = value["content"][0]["text"].as_str().unwrap().to_string();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_zip_tool_fills_defaults_and_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("zip", "10001,US"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let handler = WeatherMcp::new(service_for(&server.uri()));
        let args: ZipArgs = serde_json::from_value(json!({"zip_code": "10001"})).unwrap();
        let result = handler.get_weather_by_zip(Parameters(args)).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            first_text(&result),
            json!({"error": "ZIP code '10001' not found in country 'US'"})
        );
    }

    #[test]
    fn test_argument_defaults() {
        let args: CurrentWeatherArgs = serde_json::from_value(json!({"location": "Rome"})).unwrap();
        assert!(args.include_details);
        assert_eq!(args.units, None);

        let args: ForecastArgs = serde_json::from_value(json!({"location": "Rome"})).unwrap();
        assert_eq!(args.days, 5);

        let args: SearchArgs = serde_json::from_value(json!({"query": "Rome"})).unwrap();
        assert_eq!(args.limit, 5);

        assert!(serde_json::from_value::<ForecastArgs>(json!({"location": "Rome", "units": "kelvin"})).is_err());
        assert!(serde_json::from_value::<CurrentWeatherArgs>(json!({})).is_err());
    }

    #[test]
    fn test_argument_schemas_list_units() {
        let schema = serde_json::to_value(schemars::schema_for!(ForecastArgs)).unwrap();
        let text = schema.to_string();

        assert_eq!(schema["required"], json!(["location"]));
        assert!(text.contains("imperial"));
    }

    #[tokio::test]
    async fn test_clear_cache_tool() {
        let result = offline_handler().clear_cache().await.unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(first_text(&result), json!({"cleared": 0}));
    }

    #[tokio::test]
    async fn test_full_session_over_a_pipe() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(async move {
            let running = offline_handler().serve(server_io).await?;
            running.waiting().await?;
            anyhow::Ok(())
        });

        let client = ().serve(client_io).await.unwrap();

        let tools: Vec<String> = client
            .list_all_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for expected in [
            "get_current_weather",
            "get_forecast",
            "search_location",
            "get_weather_by_zip",
            "get_air_quality",
            "clear_cache",
        ] {
            assert!(tools.contains(&expected.to_string()), "{expected}");
        }

        let units = client
            .read_resource(ReadResourceRequestParam {
                uri: UNITS_INFO_URI.to_string(),
            })
            .await
            .unwrap();
        let units = serde_json::to_value(units).unwrap();
        let body: Value = serde_json::from_str(units["contents"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["default"], "imperial");

        let status = client
            .read_resource(ReadResourceRequestParam {
                uri: API_STATUS_URI.to_string(),
            })
            .await
            .unwrap();
        let status = serde_json::to_value(status).unwrap();
        let body: Value = serde_json::from_str(status["contents"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["calls_today"], 0);

        assert!(client
            .read_resource(ReadResourceRequestParam {
                uri: "weather://nope".to_string(),
            })
            .await
            .is_err());

        let prompt = client
            .get_prompt(GetPromptRequestParam {
                name: "travel_weather".to_string(),
                arguments: json!({"destinations": "Rome, Oslo"}).as_object().cloned(),
            })
            .await
            .unwrap();
        let prompt = serde_json::to_value(prompt).unwrap();
        assert!(prompt["messages"][0]["content"]["text"]
            .as_str()
            .unwrap()
            .contains("Destinations: Rome, Oslo"));

        assert!(client
            .get_prompt(GetPromptRequestParam {
                name: "weather_analysis".to_string(),
                arguments: None,
            })
            .await
            .is_err());

        let cleared = client
            .call_tool(CallToolRequestParam {
                name: "clear_cache".into(),
                arguments: None,
            })
            .await
            .unwrap();
        assert_eq!(first_text(&cleared), json!({"cleared": 0}));

        client.cancel().await.unwrap();
        server.await.unwrap().unwrap();
    }
}
