//! Configuration types for the assignment engine.

use pyo3::prelude::*;

/// Default cap on swap optimizer iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default role hierarchy, front-line roles first.
pub const DEFAULT_ROLE_ORDER: [&str; 7] = ["RBT", "BS", "MHA", "EA", "BCBA", "Teacher", "Director"];

/// Configuration for an engine run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of swap optimizer iterations before stopping
    #[pyo3(get, set)]
    pub max_iterations: usize,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Role names ordered from front-line to supervisory.
    /// Candidates are preferred in this order; unlisted roles come last.
    #[pyo3(get, set)]
    pub role_order: Vec<String>,
    /// Record every candidate rejection as an event
    #[pyo3(get, set)]
    pub trace_eligibility: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbosity: 0,
            role_order: DEFAULT_ROLE_ORDER.iter().map(|r| r.to_string()).collect(),
            trace_eligibility: false,
        }
    }
}

impl EngineConfig {
    /// Rank of a role in the hierarchy (lower = preferred).
    pub fn role_rank(&self, role: &str) -> usize {
        self.role_order
            .iter()
            .position(|r| r.eq_ignore_ascii_case(role))
            .unwrap_or(self.role_order.len())
    }
}

#[pymethods]
impl EngineConfig {
    #[new]
    #[pyo3(signature = (
        max_iterations=None,
        verbosity=None,
        role_order=None,
        trace_eligibility=None
    ))]
    fn new(
        max_iterations: Option<usize>,
        verbosity: Option<u8>,
        role_order: Option<Vec<String>>,
        trace_eligibility: Option<bool>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: max_iterations.unwrap_or(defaults.max_iterations),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            role_order: role_order.unwrap_or(defaults.role_order),
            trace_eligibility: trace_eligibility.unwrap_or(defaults.trace_eligibility),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(max_iterations={}, verbosity={}, roles={})",
            self.max_iterations,
            self.verbosity,
            self.role_order.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_rank_orders_front_line_first() {
        let config = EngineConfig::default();
        assert!(config.role_rank("RBT") < config.role_rank("BCBA"));
        assert!(config.role_rank("bcba") < config.role_rank("Director"));
    }

    #[test]
    fn test_unknown_role_ranks_last() {
        let config = EngineConfig::default();
        assert_eq!(config.role_rank("Volunteer"), config.role_order.len());
        assert!(config.role_rank("Director") < config.role_rank("Volunteer"));
    }
}
