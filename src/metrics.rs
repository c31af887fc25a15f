use lazy_static::lazy_static;
use prometheus::{
    HistogramVec, IntCounterVec, IntGauge, register_histogram_vec, register_int_counter_vec,
    register_int_gauge,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gateway_requests_total",
        "Total number of requests per endpoint",
        &["endpoint"]
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gateway_rate_limited_total",
        "Requests rejected by the local rate limiter",
        &["endpoint"]
    )
    .unwrap();
    pub static ref UPSTREAM_ERRORS: IntCounterVec = register_int_counter_vec!(
        "gateway_upstream_errors_total",
        "Non-success responses and transport failures from providers",
        &["endpoint", "status"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        "gateway_request_latency_seconds",
        "Request latency in seconds",
        &["endpoint"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_KEYS: IntGauge = register_int_gauge!(
        "gateway_rate_limit_keys",
        "Client keys currently tracked by the rate limiters"
    )
    .unwrap();
}
