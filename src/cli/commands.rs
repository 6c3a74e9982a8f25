//! CLI command implementations
//!
//! `explain` rebuilds one replica from a scenario (lease, local replica,
//! applied index, known closed timestamps) and reports the follower-read
//! decision for a batch that failed with a not-lease-holder error. Nothing
//! is served and no refresh is requested.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::closedts::{Entry, NoRefresh, ShardedStorage};
use crate::config::{ClusterSettings, Config};
use crate::hlc::Timestamp;
use crate::kv::{BatchRequest, KvError, NotLeaseHolderError};
use crate::lease::{Lai, Lease, RangeId, ReplicaDescriptor, ReplicaState};
use crate::observability::{Logger, MetricsRegistry, Severity};
use crate::replica::{FollowerReadDecision, Replica};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Replica and request state to evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub range_id: RangeId,
    /// Lease as recorded by the local replica.
    pub lease: Lease,
    /// Local replica; absent when it has been removed from the range.
    #[serde(default)]
    pub replica: Option<ReplicaDescriptor>,
    #[serde(default)]
    pub lease_applied_index: Lai,
    #[serde(default)]
    pub initial_max_closed: Timestamp,
    /// Watermarks received from lease holders.
    #[serde(default)]
    pub closed_timestamps: Vec<Entry>,
    /// The routing error the batch failed with; defaults to one naming
    /// the holder of `lease`.
    #[serde(default)]
    pub error: Option<NotLeaseHolderError>,
    pub batch: BatchRequest,
}

impl Scenario {
    fn build_replica(&self, config: &Config) -> CliResult<Replica> {
        let storage = Arc::new(ShardedStorage::new(config.closedts.shard_count));
        for entry in &self.closed_timestamps {
            storage.forward(*entry);
        }

        // A removed replica still needs a descriptor to be constructed.
        let local = self.replica.unwrap_or(self.lease.holder);
        let state = ReplicaState::new(self.range_id, self.lease, local)
            .with_initial_max_closed(self.initial_max_closed);
        state
            .advance_lease_applied_index(self.lease_applied_index)
            .map_err(|e| CliError::invalid_scenario(e.to_string()))?;
        if self.replica.is_none() {
            state.mark_removed();
        }

        Ok(Replica::new(
            state,
            storage,
            Arc::new(NoRefresh),
            Arc::new(ClusterSettings::from_config(config)),
            Arc::new(MetricsRegistry::new()),
        ))
    }

    fn prior_error(&self) -> KvError {
        self.error
            .clone()
            .unwrap_or_else(|| NotLeaseHolderError::new(self.range_id, self.lease))
            .into()
    }
}

/// Evaluate a scenario against a configuration
pub fn evaluate(config: &Config, scenario: &Scenario) -> CliResult<FollowerReadDecision> {
    let replica = scenario.build_replica(config)?;
    replica
        .explain_follower_read(&scenario.batch, &scenario.prior_error())
        .map_err(|e| CliError::evaluation_failed(e.to_string()))
}

/// Main entry point for CLI
///
/// Stdout carries exactly one response object, so logging is limited to
/// errors, which go to stderr.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    Logger::set_min_severity(Severity::Error);
    run_command(cli.command).map_err(|e| {
        let _ = write_error(e.code_str(), e.message());
        e
    })
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Explain { config } => explain(&config),
    }
}

/// Explain follower-read eligibility for the scenario on stdin
pub fn explain(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;

    let request = read_request()?;
    let scenario: Scenario = serde_json::from_value(request)
        .map_err(|e| CliError::invalid_scenario(format!("Invalid scenario: {}", e)))?;

    let decision = evaluate(&config, &scenario)?;
    write_response(serde_json::to_value(&decision)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::FollowerReadReason;
    use serde_json::json;

    fn scenario(request_wall: i64) -> serde_json::Value {
        json!({
            "range_id": 7,
            "lease": {
                "start": {"wall_time": 10},
                "holder": {"node_id": 2, "store_id": 2, "replica_type": "VOTER_FULL"},
                "type": "epoch",
                "epoch": 5
            },
            "replica": {"node_id": 1, "store_id": 1, "replica_type": "VOTER_FULL"},
            "lease_applied_index": 3,
            "closed_timestamps": [
                {"node_id": 2, "range_id": 7, "epoch": 5, "lai": 3,
                 "closed": {"wall_time": 100, "logical": 0}}
            ],
            "batch": {
                "range_id": 7,
                "timestamp": {"wall_time": request_wall},
                "requests": [{"kind": "get", "key": "a"}]
            }
        })
    }

    fn parse(value: serde_json::Value) -> Scenario {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_evaluate_eligible() {
        let decision = evaluate(&Config::default(), &parse(scenario(90))).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.max_closed, Some(Timestamp::from_wall(100)));
    }

    #[test]
    fn test_evaluate_too_low() {
        let decision = evaluate(&Config::default(), &parse(scenario(110))).unwrap();
        assert_eq!(decision.reason, FollowerReadReason::ClosedTimestampTooLow);
        assert_eq!(decision.refresh_from, Some(crate::lease::NodeId(2)));
    }

    #[test]
    fn test_evaluate_respects_config() {
        let config = Config {
            follower_reads_enabled: false,
            ..Config::default()
        };
        let decision = evaluate(&config, &parse(scenario(90))).unwrap();
        assert_eq!(decision.reason, FollowerReadReason::Disabled);
    }

    #[test]
    fn test_evaluate_removed_replica() {
        let mut value = scenario(90);
        value["replica"] = serde_json::Value::Null;
        let err = evaluate(&Config::default(), &parse(value)).unwrap_err();
        assert_eq!(err.code_str(), "RANGEKV_CLI_EVALUATION_FAILED");
    }

    #[test]
    fn test_scenario_rejects_missing_batch() {
        let mut value = scenario(90);
        value.as_object_mut().unwrap().remove("batch");
        assert!(serde_json::from_value::<Scenario>(value).is_err());
    }
}
