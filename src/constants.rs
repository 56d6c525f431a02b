// Remote view holding trades bucketed per time unit.
pub const TRADES_AGGREGATED_VIEW: &str = "tradesAggregated";

// Columns requested from the aggregated view.
pub const TRADES_AGGREGATED_FIELDS: [&str; 6] = ["date", "open", "close", "min", "max", "volumeBase"];

// Local storage key holding the serialized announcement flags.
pub const ANNOUNCEMENTS_KEY: &str = "announcements";

// Environment variables.
pub const ENV_DATA_SERVICE_URL: &str = "oasis_data_service_url";
pub const ENV_SQLITE_FILE: &str = "sqlite_file";
pub const ENV_CHART_TIMEZONE: &str = "chart_timezone";

pub const DEFAULT_SQLITE_FILE: &str = "oasis_chart.db";

// Buffered chart updates before the loader waits on its consumer.
pub const LOADER_OUTPUT_BUFFER: usize = 16;
