//! Fallback chain selection
//!
//! Turns the static priority order of an operation into the ordered list of
//! providers worth trying for one request.

use std::collections::HashMap;

use domain::{Operation, ProviderId};

use super::health_registry::HealthRegistry;

/// Ordered providers to try for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    operation: Operation,
    providers: Vec<ProviderId>,
}

impl FallbackChain {
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.iter().copied()
    }
}

/// Static priority routes per operation
#[derive(Debug, Clone, Default)]
pub struct FallbackChainSelector {
    routes: HashMap<Operation, Vec<ProviderId>>,
}

impl FallbackChainSelector {
    /// Build a selector; duplicate providers in a route keep their first position
    pub fn new(routes: HashMap<Operation, Vec<ProviderId>>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(operation, order)| {
                let mut deduped: Vec<ProviderId> = Vec::with_capacity(order.len());
                for provider in order {
                    if !deduped.contains(&provider) {
                        deduped.push(provider);
                    }
                }
                (operation, deduped)
            })
            .collect();
        Self { routes }
    }

    /// Whether `operation` has a configured route
    #[must_use]
    pub fn is_routed(&self, operation: Operation) -> bool {
        self.routes.contains_key(&operation)
    }

    /// Configured priority order for `operation`
    #[must_use]
    pub fn priority_order(&self, operation: Operation) -> Option<&[ProviderId]> {
        self.routes.get(&operation).map(Vec::as_slice)
    }

    /// Select the providers to try for one request
    ///
    /// The preferred provider is moved to the front when it is routed for the
    /// operation and its breaker admits calls. Providers whose breakers do not
    /// admit calls are dropped. Selection never claims a half-open trial; the
    /// executor re-checks each breaker right before calling.
    pub fn select(
        &self,
        operation: Operation,
        preferred: Option<ProviderId>,
        health: &HealthRegistry,
    ) -> FallbackChain {
        let mut providers = self
            .priority_order(operation)
            .map(<[ProviderId]>::to_vec)
            .unwrap_or_default();

        if let Some(preferred) = preferred {
            match providers.iter().position(|p| *p == preferred) {
                Some(index) if health.would_admit(preferred) => {
                    let provider = providers.remove(index);
                    providers.insert(0, provider);
                },
                Some(_) => {
                    tracing::debug!(%operation, %preferred, "Preferred provider is not admitting calls");
                },
                None => {
                    tracing::debug!(%operation, %preferred, "Preferred provider is not routed for operation");
                },
            }
        }

        providers.retain(|provider| health.would_admit(*provider));

        FallbackChain {
            operation,
            providers,
        }
    }
}
