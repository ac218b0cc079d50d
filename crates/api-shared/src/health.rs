use crate::HealthRes;

/// Health service shared by every binary that serves the relay API.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the relay is up.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Form relay is alive".into(),
        }
    }
}
