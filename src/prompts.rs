pub fn weather_analysis(location: &str) -> String {
    format!(
        "Analyze the weather conditions for {}:\n\n\
         1. Get current weather conditions\n\
         2. Fetch 5-day forecast\n\
         3. Check air quality if available\n\
         4. Provide insights on:\n   \
            - Weather trends over the next few days\n   \
            - Any extreme conditions to be aware of\n   \
            - Recommendations for outdoor activities\n   \
            - Clothing suggestions\n   \
            - Health considerations based on air quality\n\n\
         Use the available weather tools to gather comprehensive data.",
        location
    )
}

pub fn travel_weather(destinations: &str) -> String {
    format!(
        "Compare weather conditions for travel planning:\n\n\
         Destinations: {}\n\n\
         Please:\n\
         1. Get current weather for each destination\n\
         2. Fetch forecasts for the next 5 days\n\
         3. Compare temperatures, conditions, and precipitation\n\
         4. Identify the best weather windows\n\
         5. Provide packing recommendations\n\
         6. Suggest weather-appropriate activities for each location\n\n\
         Use get_current_weather for each destination and get_forecast tools for comprehensive analysis.",
        destinations
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_analysis_mentions_location() {
        let prompt = weather_analysis("Reykjavik");
        assert!(prompt.starts_with("Analyze the weather conditions for Reykjavik:"));
        assert!(prompt.contains("   - Clothing suggestions\n"));
    }

    #[test]
    fn test_travel_weather_lists_destinations() {
        let prompt = travel_weather("Lisbon, Porto");
        assert!(prompt.contains("Destinations: Lisbon, Porto\n"));
        assert!(prompt.ends_with("comprehensive analysis."));
    }
}
