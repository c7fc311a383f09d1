/// User agent string for HTTP requests
pub const USER_AGENT: &str = "epa-air-collector/0.1.0";

/// EPA Victoria environment monitoring API base URL
pub const EPA_API_BASE: &str = "https://gateway.api.epa.vic.gov.au/environmentMonitoring/v1";

/// Header carrying the subscription key on every request
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Environmental segment queried by default
pub const DEFAULT_SEGMENT: &str = "air";

/// Requests per second the gateway tolerates before answering 429
pub const DEFAULT_RATE_PER_SEC: u32 = 5;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 8_000;

/// Logical per-site fetches allowed in flight at once
pub const DEFAULT_CONCURRENCY: usize = 8;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_OUTPUT: &str = "air_readings.csv";

/// Column order of the readings CSV
pub const CSV_COLUMNS: [&str; 10] = [
    "siteID",
    "parameter",
    "unit",
    "series",
    "since",
    "until",
    "averageValue",
    "healthAdvice",
    "healthAdviceColor",
    "healthCode",
];
