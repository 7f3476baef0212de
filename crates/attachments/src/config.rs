use std::time::Duration;

/// Configuration for the [`AttachmentService`](crate::AttachmentService).
#[derive(Debug, Clone)]
pub struct AttachmentConfig {
    /// Minimum age a pending or untracked blob must reach before the sweep
    /// may reclaim it.
    pub retention: Duration,
    /// Maximum items each sweep pass processes per invocation. A backlog
    /// larger than one batch drains over successive invocations.
    pub sweep_batch_size: usize,
    /// Whether registration tolerates an expense referencing a blob that has
    /// no ledger row (data written before the ledger existed). Leave enabled
    /// until no pre-ledger expenses remain, then disable.
    pub accept_legacy_references: bool,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_batch_size: 100,
            accept_legacy_references: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = AttachmentConfig::default();
        assert_eq!(cfg.retention, Duration::from_secs(86_400));
        assert_eq!(cfg.sweep_batch_size, 100);
        assert!(cfg.accept_legacy_references);
    }
}
