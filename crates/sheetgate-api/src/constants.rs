/// Room for multipart boundaries and part headers on top of the file ceiling.
pub const MULTIPART_OVERHEAD_BYTES: usize = 16 * 1024;

/// Interval between engine health probes while waiting at startup.
pub const ENGINE_READY_POLL_INTERVAL_MS: u64 = 500;

/// Service name reported by the documentation endpoint.
pub const SERVICE_NAME: &str = "XLSX Conversion Service";
