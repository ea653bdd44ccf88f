use crate::dto::HealthRes;

/// Simple health service used by the REST API.
///
/// Provides a standardised liveness answer for monitoring and load balancer checks.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Behavioral Analysis API is alive".into(),
        }
    }
}
