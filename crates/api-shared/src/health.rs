use crate::dto::HealthRes;

/// Simple health service shared by every API front end.
///
/// This service provides a standardised way to check the health status of the HSR system.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Checks health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "HSR is alive".into(),
        }
    }
}
