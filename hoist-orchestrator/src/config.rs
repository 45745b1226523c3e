//! Orchestrator configuration

use std::path::PathBuf;

/// Default queue depth before triggers are rejected
const DEFAULT_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub bind_addr: String,
    /// Lua plan file; the built-in plan is used when unset
    pub plan_path: Option<PathBuf>,
    pub queue_capacity: usize,
}

impl OrchestratorConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - HOIST_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - HOIST_PLAN (optional)
    /// - HOIST_QUEUE_CAPACITY (optional, default: 32)
    pub fn from_env() -> anyhow::Result<Self> {
        let queue_capacity = match std::env::var("HOIST_QUEUE_CAPACITY") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                anyhow::anyhow!("HOIST_QUEUE_CAPACITY must be a number, got '{raw}'")
            })?,
            Err(_) => DEFAULT_QUEUE_CAPACITY,
        };

        let config = Self {
            bind_addr: std::env::var("HOIST_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            plan_path: std::env::var("HOIST_PLAN")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            queue_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut config = OrchestratorConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            plan_path: None,
            queue_capacity: 4,
        };
        assert!(config.validate().is_ok());

        config.queue_capacity = 0;
        assert!(config.validate().is_err());

        config.queue_capacity = 4;
        config.bind_addr = " ".to_string();
        assert!(config.validate().is_err());
    }
}
