/// Runtime tuning for the background pipeline. Everything here has a
/// default and an env override; policy constants (the 100-item
/// sync/async split) live with the code that applies them.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Number of background job workers.
    pub worker_count: usize,
    /// Capacity of the job channel between handlers and workers.
    pub job_queue_capacity: usize,
    /// Max concurrent endpoint deliveries within one dispatch job.
    pub delivery_concurrency: usize,
    /// Backoff base: delay before retry attempt k is base * 2^(k-2).
    pub retry_base_delay_ms: u64,
    /// Ceiling on any single backoff sleep.
    pub retry_max_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("CATALOG_WORKER_COUNT")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.worker_count = parsed.max(1);
        }
        if let Ok(value) = std::env::var("CATALOG_JOB_QUEUE_CAPACITY")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.job_queue_capacity = parsed.max(1);
        }
        if let Ok(value) = std::env::var("CATALOG_DELIVERY_CONCURRENCY")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.delivery_concurrency = parsed.max(1);
        }
        if let Ok(value) = std::env::var("CATALOG_RETRY_BASE_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry_base_delay_ms = parsed;
        }
        if let Ok(value) = std::env::var("CATALOG_RETRY_MAX_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry_max_delay_ms = parsed;
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            job_queue_capacity: 1024,
            delivery_concurrency: 8,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 60_000,
        }
    }
}
