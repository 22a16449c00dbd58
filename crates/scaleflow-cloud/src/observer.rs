//! Reads the current provider state of a topology

use crate::action::ResourceKind;
use crate::error::ObservationError;
use crate::observed::{ForeignClaim, ObservedState};
use crate::provider::ProviderClient;
use scaleflow_core::Topology;

/// Fetch every resource the provider holds for `topology`.
///
/// A `NotFound` listing means nothing exists yet. Transient and
/// unrecoverable failures abort the observation.
pub async fn observe(
    client: &dyn ProviderClient,
    topology: &str,
) -> Result<ObservedState, ObservationError> {
    match client.list_resources(topology).await {
        Ok(state) => {
            tracing::debug!(
                topology,
                resources = state.resource_count(),
                "Observed provider state"
            );
            Ok(state)
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(topology, "Nothing provisioned yet");
            Ok(ObservedState::empty(topology))
        }
        Err(source) => Err(ObservationError::List {
            topology: topology.to_string(),
            source,
        }),
    }
}

/// [`observe`], then record every desired name another topology already owns
pub async fn observe_topology(
    client: &dyn ProviderClient,
    desired: &Topology,
) -> Result<ObservedState, ObservationError> {
    let mut observed = observe(client, &desired.name).await?;

    // policy names are scoped by their group, so only global names are checked
    let wanted = [
        (ResourceKind::LoadBalancer, desired.load_balancer.name.clone()),
        (
            ResourceKind::LaunchTemplate,
            desired.launch_template.revision_name(),
        ),
        (ResourceKind::ScalingGroup, desired.scaling_group.name.clone()),
    ]
    .into_iter()
    .chain(
        desired
            .alarms
            .iter()
            .map(|alarm| (ResourceKind::Alarm, alarm.name.clone())),
    );

    for (kind, name) in wanted {
        if observed.owns(kind, &name) {
            continue;
        }
        match client.lookup_owner(kind, &name).await {
            Ok(Some(owner)) if owner != desired.name => {
                tracing::warn!(
                    topology = %desired.name,
                    %kind,
                    name = %name,
                    owner = %owner,
                    "Desired name is owned by another topology"
                );
                observed.foreign.push(ForeignClaim { kind, name, owner });
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(source) => {
                return Err(ObservationError::Ownership { kind, name, source });
            }
        }
    }

    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testing::{FakeProvider, collector, mirror};

    #[tokio::test]
    async fn test_not_found_listing_is_empty_state() {
        let provider = FakeProvider::new();
        provider.fail_listing(ProviderError::not_found("no such tag"));

        let observed = observe(&provider, "storm-collector").await.unwrap();
        assert!(observed.is_empty());
        assert_eq!(observed.topology, "storm-collector");
    }

    #[tokio::test]
    async fn test_transport_failure_is_observation_error() {
        let provider = FakeProvider::new();
        provider.fail_listing(ProviderError::transient("connection reset"));

        let result = observe(&provider, "storm-collector").await;
        assert!(matches!(result, Err(ObservationError::List { .. })));
    }

    #[tokio::test]
    async fn test_observe_topology_records_foreign_claims() {
        let desired = collector();
        let provider = FakeProvider::new();
        provider.set_owner("StormTestCollector", "other-tier");

        let observed = observe_topology(&provider, &desired).await.unwrap();
        assert_eq!(
            observed.foreign,
            vec![ForeignClaim {
                kind: ResourceKind::LoadBalancer,
                name: "StormTestCollector".to_string(),
                owner: "other-tier".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_observe_topology_skips_owned_names() {
        let desired = collector();
        let provider = FakeProvider::new();
        provider.set_observed(mirror(&desired));

        let observed = observe_topology(&provider, &desired).await.unwrap();
        assert!(observed.foreign.is_empty());
        assert_eq!(provider.count("lookup_owner"), 0);
    }

    #[tokio::test]
    async fn test_observe_topology_owner_lookup_failure() {
        let desired = collector();
        let provider = FakeProvider::new();
        provider.fail("lookup_owner", ProviderError::unrecoverable("access denied"));

        let result = observe_topology(&provider, &desired).await;
        assert!(matches!(
            result,
            Err(ObservationError::Ownership {
                kind: ResourceKind::LoadBalancer,
                ..
            })
        ));
    }
}
