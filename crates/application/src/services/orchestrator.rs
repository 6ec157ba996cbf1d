//! Provider orchestrator
//!
//! Executes one request against an ordered chain of interchangeable
//! providers. Each provider sits behind a circuit breaker; failures are
//! classified and retried according to their category, then the chain
//! advances. When every provider is exhausted the orchestrator serves the
//! operation's terminal fallback (flagged as degraded) or reports the
//! operation as unavailable.
//!
//! One orchestrator exists per operation family and is shared by all request
//! tasks; all per-provider state lives inside it.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};

use domain::{
    ErrorCategory, Operation, OperationFamily, ProviderId, RequestOutcome, ServiceHealth,
};
use futures::future::{BoxFuture, join_all};
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::{
    circuit_breaker::CircuitBreakerConfig,
    error_classifier::classify,
    fallback_chain::FallbackChainSelector,
    health_registry::HealthRegistry,
    result_cache::{CacheEntry, ResultCache, ResultCacheStats},
    retry_policy::RetryPolicies,
};
use crate::{
    error::ApplicationError,
    ports::{CacheLookup, OutcomeRecorderPort, ProviderError},
};

/// Default bound for a single provider call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Binds an operation family to its capability port and payload types
pub trait ProviderFamily: Send + Sync + 'static {
    /// Capability interface implemented by provider adapters
    type Port: ?Sized + Send + Sync + 'static;
    /// Request payload
    type Request: Send + Sync;
    /// Result payload; serializable so it can be cached
    type Output: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    const FAMILY: OperationFamily;

    /// Invoke the provider for one attempt
    fn invoke<'a>(
        port: &'a Self::Port,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Self::Output, ProviderError>>;

    /// Ask the provider whether it is alive
    fn health_check(port: &Self::Port) -> BoxFuture<'_, bool>;

    /// Normalized request components identifying a cacheable result
    ///
    /// `None` means the request must not be cached.
    fn cache_components(_request: &Self::Request) -> Option<Vec<String>> {
        None
    }
}

/// Produces a degraded result when no provider could serve a request
pub type TerminalFallback<F> = Arc<
    dyn Fn(&<F as ProviderFamily>::Request) -> <F as ProviderFamily>::Output + Send + Sync,
>;

/// Result of an orchestrated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orchestrated<T> {
    pub data: T,
    /// Provider that produced the data; `None` for terminal fallbacks
    pub provider_used: Option<ProviderId>,
    /// Produced by a terminal fallback rather than a provider
    pub degraded: bool,
    /// Served from the result cache
    pub cached: bool,
    /// Retries spent across the whole chain
    pub retries_used: u32,
}

impl<T> Orchestrated<T> {
    fn from_cache(entry: CacheEntry<T>) -> Self {
        Self {
            data: entry.value,
            provider_used: Some(entry.provider),
            degraded: false,
            cached: true,
            retries_used: 0,
        }
    }

    /// Transform the payload, keeping the metadata
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Orchestrated<U> {
        Orchestrated {
            data: f(self.data),
            provider_used: self.provider_used,
            degraded: self.degraded,
            cached: self.cached,
            retries_used: self.retries_used,
        }
    }
}

/// Resilience settings shared by every provider of an orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub breaker_overrides: HashMap<ProviderId, CircuitBreakerConfig>,
    pub retry: RetryPolicies,
    pub call_timeout: Duration,
    pub provider_timeouts: HashMap<ProviderId, Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            breaker_overrides: HashMap::new(),
            retry: RetryPolicies::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            provider_timeouts: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    fn breaker_for(&self, provider: ProviderId) -> CircuitBreakerConfig {
        self.breaker_overrides
            .get(&provider)
            .copied()
            .unwrap_or(self.circuit_breaker)
    }
}

/// Registers providers, routes and fallbacks, then validates them
pub struct OrchestratorBuilder<F: ProviderFamily> {
    config: OrchestratorConfig,
    providers: BTreeMap<ProviderId, Arc<F::Port>>,
    routes: HashMap<Operation, Vec<ProviderId>>,
    fallbacks: HashMap<Operation, TerminalFallback<F>>,
    cache: Option<Arc<ResultCache>>,
    cached_operations: HashSet<Operation>,
    recorder: Option<Arc<dyn OutcomeRecorderPort>>,
}

impl<F: ProviderFamily> fmt::Debug for OrchestratorBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("family", &F::FAMILY)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("routes", &self.routes)
            .field("fallbacks", &self.fallbacks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<F: ProviderFamily> OrchestratorBuilder<F> {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            providers: BTreeMap::new(),
            routes: HashMap::new(),
            fallbacks: HashMap::new(),
            cache: None,
            cached_operations: HashSet::new(),
            recorder: None,
        }
    }

    /// Register a provider adapter
    #[must_use]
    pub fn provider(mut self, provider: ProviderId, port: Arc<F::Port>) -> Self {
        self.providers.insert(provider, port);
        self
    }

    /// Set the priority order for an operation
    #[must_use]
    pub fn route(
        mut self,
        operation: Operation,
        order: impl IntoIterator<Item = ProviderId>,
    ) -> Self {
        self.routes.insert(operation, order.into_iter().collect());
        self
    }

    /// Register the terminal fallback for an operation
    #[must_use]
    pub fn fallback(
        mut self,
        operation: Operation,
        fallback: impl Fn(&F::Request) -> F::Output + Send + Sync + 'static,
    ) -> Self {
        self.fallbacks.insert(operation, Arc::new(fallback));
        self
    }

    /// Cache successful results of `operations`
    #[must_use]
    pub fn cache(
        mut self,
        cache: Arc<ResultCache>,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Self {
        self.cache = Some(cache);
        self.cached_operations.extend(operations);
        self
    }

    /// Forward every attempt to an outcome recorder
    #[must_use]
    pub fn recorder(mut self, recorder: Arc<dyn OutcomeRecorderPort>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Whether a route is registered for `operation`
    #[must_use]
    pub fn is_routed(&self, operation: Operation) -> bool {
        self.routes.contains_key(&operation)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        let family = F::FAMILY;
        let misconfigured = |message: String| Err(ApplicationError::Configuration(message));

        if self.routes.is_empty() {
            return misconfigured(format!("{family} orchestrator has no routes"));
        }
        if self.config.call_timeout.is_zero() {
            return misconfigured(format!("{family} orchestrator call timeout must be positive"));
        }
        if let Some(provider) = self.providers.keys().find(|p| p.family() != family) {
            return misconfigured(format!(
                "provider {provider} serves {}, not {family}",
                provider.family()
            ));
        }
        for (operation, order) in &self.routes {
            if operation.family() != family {
                return misconfigured(format!(
                    "operation {operation} belongs to {}, not {family}",
                    operation.family()
                ));
            }
            if let Some(missing) = order.iter().find(|p| !self.providers.contains_key(*p)) {
                return misconfigured(format!(
                    "operation {operation} routes to unregistered provider {missing}"
                ));
            }
            if order.is_empty() && !self.fallbacks.contains_key(operation) {
                warn!(%operation, "Operation has no providers and no terminal fallback");
            }
        }
        if let Some(operation) = self.fallbacks.keys().find(|op| !self.is_routed(**op)) {
            return misconfigured(format!("fallback registered for unrouted operation {operation}"));
        }
        if let Some(operation) = self.cached_operations.iter().find(|op| !self.is_routed(**op)) {
            return misconfigured(format!("cache enabled for unrouted operation {operation}"));
        }
        Ok(())
    }

    /// Validate the registration and build the orchestrator
    pub fn build(self) -> Result<Orchestrator<F>, ApplicationError> {
        self.validate()?;

        let health = HealthRegistry::new(
            self.providers
                .keys()
                .map(|provider| (*provider, self.config.breaker_for(*provider))),
        );
        info!(
            family = %F::FAMILY,
            providers = self.providers.len(),
            operations = self.routes.len(),
            fallbacks = self.fallbacks.len(),
            cached_operations = self.cached_operations.len(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            providers: self.providers,
            selector: FallbackChainSelector::new(self.routes),
            health,
            retry: self.config.retry,
            call_timeout: self.config.call_timeout,
            provider_timeouts: self.config.provider_timeouts,
            fallbacks: self.fallbacks,
            cache: self.cache,
            cached_operations: self.cached_operations,
            recorder: self.recorder,
        })
    }
}

/// How one provider's turn in the chain ended
enum ProviderAttempt<T> {
    Succeeded { output: T, retries: u32 },
    Exhausted { category: ErrorCategory, retries: u32 },
}

/// Executes requests for one operation family across its providers
pub struct Orchestrator<F: ProviderFamily> {
    providers: BTreeMap<ProviderId, Arc<F::Port>>,
    selector: FallbackChainSelector,
    health: HealthRegistry,
    retry: RetryPolicies,
    call_timeout: Duration,
    provider_timeouts: HashMap<ProviderId, Duration>,
    fallbacks: HashMap<Operation, TerminalFallback<F>>,
    cache: Option<Arc<ResultCache>>,
    cached_operations: HashSet<Operation>,
    recorder: Option<Arc<dyn OutcomeRecorderPort>>,
}

impl<F: ProviderFamily> fmt::Debug for Orchestrator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("family", &F::FAMILY)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("selector", &self.selector)
            .field("call_timeout", &self.call_timeout)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<F: ProviderFamily> Orchestrator<F> {
    /// Start building an orchestrator for this family
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder<F> {
        OrchestratorBuilder::new(config)
    }

    #[must_use]
    pub const fn family(&self) -> OperationFamily {
        F::FAMILY
    }

    /// Execute `request` for `operation`, trying `preferred` first when it is healthy
    #[instrument(skip(self, request), fields(family = %F::FAMILY))]
    pub async fn execute(
        &self,
        operation: Operation,
        request: &F::Request,
        preferred: Option<ProviderId>,
    ) -> Result<Orchestrated<F::Output>, ApplicationError> {
        if !self.selector.is_routed(operation) {
            return Err(ApplicationError::UnroutedOperation {
                operation,
                family: F::FAMILY,
            });
        }

        let Some((cache, key)) = self.cache_slot(operation, request) else {
            return self.run_chain(operation, request, preferred).await;
        };

        if let Some(entry) = cache.lookup::<F::Output>(&key).await {
            self.notify_cache_lookup(operation, CacheLookup::Hit);
            return Ok(Orchestrated::from_cache(entry));
        }

        let flight = cache.acquire_flight(&key).await;
        if flight.waited() {
            if let Some(entry) = cache.recheck::<F::Output>(&key).await {
                debug!(%operation, "Result produced by concurrent request");
                self.notify_cache_lookup(operation, CacheLookup::Coalesced);
                return Ok(Orchestrated::from_cache(entry));
            }
        }
        self.notify_cache_lookup(operation, CacheLookup::Miss);

        let result = self.run_chain(operation, request, preferred).await?;
        if let (false, Some(provider)) = (result.degraded, result.provider_used) {
            cache
                .store(&key, &CacheEntry::new(result.data.clone(), provider))
                .await;
        }
        drop(flight);
        Ok(result)
    }

    fn cache_slot(&self, operation: Operation, request: &F::Request) -> Option<(&ResultCache, String)> {
        if !self.cached_operations.contains(&operation) {
            return None;
        }
        let cache = self.cache.as_deref()?;
        let components = F::cache_components(request)?;
        let key = cache.key(operation, &components);
        Some((cache, key))
    }

    async fn run_chain(
        &self,
        operation: Operation,
        request: &F::Request,
        preferred: Option<ProviderId>,
    ) -> Result<Orchestrated<F::Output>, ApplicationError> {
        let chain = self.selector.select(operation, preferred, &self.health);
        if chain.is_empty() {
            warn!(%operation, "No provider available for operation");
        }

        let mut retries_used = 0_u32;
        for provider in chain.iter() {
            if !self.health.can_execute(provider) {
                debug!(%operation, %provider, "Circuit rejected call, skipping provider");
                continue;
            }
            let Some(port) = self.providers.get(&provider) else {
                continue;
            };

            match self
                .attempt_provider(operation, provider, port.as_ref(), request)
                .await
            {
                ProviderAttempt::Succeeded { output, retries } => {
                    retries_used = retries_used.saturating_add(retries);
                    self.health.record_success(provider);
                    return Ok(Orchestrated {
                        data: output,
                        provider_used: Some(provider),
                        degraded: false,
                        cached: false,
                        retries_used,
                    });
                },
                ProviderAttempt::Exhausted { category, retries } => {
                    retries_used = retries_used.saturating_add(retries);
                    self.health.record_failure(provider);
                    warn!(
                        %operation,
                        %provider,
                        %category,
                        retries,
                        "Provider exhausted, advancing fallback chain"
                    );
                },
            }
        }

        if let Some(fallback) = self.fallbacks.get(&operation) {
            warn!(%operation, retries_used, "All providers exhausted, serving terminal fallback");
            if let Some(recorder) = &self.recorder {
                recorder.record_degraded(operation);
            }
            return Ok(Orchestrated {
                data: fallback(request),
                provider_used: None,
                degraded: true,
                cached: false,
                retries_used,
            });
        }

        error!(%operation, retries_used, "All providers exhausted and no fallback registered");
        Err(ApplicationError::ServiceUnavailable { operation })
    }

    /// Call one provider, retrying per error category
    ///
    /// Nothing is recorded until the awaited call returns, so a request
    /// cancelled mid-call leaves the provider's breaker untouched.
    async fn attempt_provider(
        &self,
        operation: Operation,
        provider: ProviderId,
        port: &F::Port,
        request: &F::Request,
    ) -> ProviderAttempt<F::Output> {
        let timeout = self.timeout_for(provider);
        let mut retries = 0_u32;

        loop {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, F::invoke(port, request)).await {
                Ok(result) => result,
                Err(_) => Err(format!(
                    "{provider} request timeout after {}ms",
                    timeout.as_millis()
                )
                .into()),
            };
            let latency = started.elapsed();

            match result {
                Ok(output) => {
                    let outcome = RequestOutcome::success(operation, provider, latency, retries);
                    info!(
                        operation = %outcome.operation,
                        provider = %outcome.provider,
                        outcome = outcome.outcome_label(),
                        latency_ms = outcome.latency_ms(),
                        retry_index = outcome.retries_used,
                        "Provider attempt"
                    );
                    self.notify_attempt(&outcome);
                    return ProviderAttempt::Succeeded { output, retries };
                },
                Err(err) => {
                    let category = classify(&err);
                    let outcome =
                        RequestOutcome::failure(operation, provider, latency, category, retries);
                    warn!(
                        operation = %outcome.operation,
                        provider = %outcome.provider,
                        outcome = outcome.outcome_label(),
                        category = %category,
                        latency_ms = outcome.latency_ms(),
                        retry_index = outcome.retries_used,
                        error = %err,
                        "Provider attempt"
                    );
                    self.notify_attempt(&outcome);

                    let policy = self.retry.for_category(category);
                    if !policy.allows_retry(retries) {
                        return ProviderAttempt::Exhausted { category, retries };
                    }
                    let delay = policy.delay_for_attempt(retries);
                    debug!(
                        %operation,
                        %provider,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                },
            }
        }
    }

    fn timeout_for(&self, provider: ProviderId) -> Duration {
        self.provider_timeouts
            .get(&provider)
            .copied()
            .unwrap_or(self.call_timeout)
    }

    fn notify_attempt(&self, outcome: &RequestOutcome) {
        if let Some(recorder) = &self.recorder {
            recorder.record_attempt(outcome);
        }
    }

    fn notify_cache_lookup(&self, operation: Operation, lookup: CacheLookup) {
        if let Some(recorder) = &self.recorder {
            recorder.record_cache_lookup(operation, lookup);
        }
    }

    /// Force every breaker closed and every provider healthy
    pub fn reset(&self) {
        self.health.reset();
        info!(family = %F::FAMILY, "All circuit breakers reset by operator");
    }

    /// Force one provider's breaker closed; `false` if it is not registered
    pub fn reset_provider(&self, provider: ProviderId) -> bool {
        let reset = self.health.reset_provider(provider);
        if reset {
            info!(family = %F::FAMILY, %provider, "Circuit breaker reset by operator");
        }
        reset
    }

    /// Read-only health of every registered provider
    #[must_use]
    pub fn health_snapshot(&self) -> BTreeMap<ProviderId, ServiceHealth> {
        self.health.snapshot()
    }

    /// Read-only health of one provider
    #[must_use]
    pub fn get_health(&self, provider: ProviderId) -> Option<ServiceHealth> {
        self.health.get_health(provider)
    }

    /// Probe every provider's own health check concurrently
    ///
    /// Probe results are reported only; breakers and health records are not
    /// touched.
    pub async fn probe_health(&self) -> BTreeMap<ProviderId, bool> {
        let probes = self.providers.iter().map(|(provider, port)| {
            let timeout = self.timeout_for(*provider);
            async move {
                let healthy = tokio::time::timeout(timeout, F::health_check(port.as_ref()))
                    .await
                    .unwrap_or(false);
                if !healthy {
                    warn!(%provider, "Provider health probe failed");
                }
                (*provider, healthy)
            }
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Parse a caller-supplied preferred provider name
    ///
    /// Unknown or unregistered names are ignored with a warning.
    pub fn resolve_preferred(&self, name: Option<&str>) -> Option<ProviderId> {
        let name = name.map(str::trim).filter(|n| !n.is_empty())?;
        match name.parse::<ProviderId>() {
            Ok(provider) if self.providers.contains_key(&provider) => Some(provider),
            Ok(provider) => {
                warn!(%provider, family = %F::FAMILY, "Preferred provider is not registered, ignoring");
                None
            },
            Err(err) => {
                warn!(error = %err, "Unknown preferred provider, ignoring");
                None
            },
        }
    }

    /// Breakers and health records backing this orchestrator
    #[must_use]
    pub const fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Static priority order for `operation`
    #[must_use]
    pub fn priority_order(&self, operation: Operation) -> Option<&[ProviderId]> {
        self.selector.priority_order(operation)
    }

    /// Result cache statistics, when a cache is attached
    #[must_use]
    pub fn cache_stats(&self) -> Option<ResultCacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Drop cached results for `operation`; returns the number removed
    pub async fn invalidate_cache(&self, operation: Operation) -> u64 {
        match &self.cache {
            Some(cache) if self.cached_operations.contains(&operation) => {
                cache.invalidate_operation(operation).await
            },
            _ => 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use domain::{CircuitState, HealthStatus};
    use mockall::predicate::always;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        ports::{MockOutcomeRecorderPort, MockTextGenerationPort, TextGenerationPort},
        services::{
            retry_policy::RetryPolicy,
            text_generation::{TextGeneration, TextRequest},
        },
    };

    /// Text provider replaying a script; the last step repeats forever
    pub(crate) struct ScriptedText {
        script: Vec<Result<String, String>>,
        cursor: Mutex<usize>,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedText {
        pub(crate) fn new(script: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                script: script
                    .into_iter()
                    .map(|step| step.map(str::to_string).map_err(str::to_string))
                    .collect(),
                cursor: Mutex::new(0),
                calls: AtomicU32::new(0),
                delay: None,
            })
        }

        pub(crate) fn ok(text: &str) -> Arc<Self> {
            Self::new(vec![Ok(text)])
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            Self::new(vec![Err(message)])
        }

        pub(crate) fn slow(text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: vec![Ok(text.to_string())],
                cursor: Mutex::new(0),
                calls: AtomicU32::new(0),
                delay: Some(delay),
            })
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerationPort for ScriptedText {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let step = {
                let mut cursor = self.cursor.lock();
                let step = self.script[(*cursor).min(self.script.len() - 1)].clone();
                *cursor += 1;
                step
            };
            step.map_err(Into::into)
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            circuit_breaker: CircuitBreakerConfig::custom(3, Duration::from_secs(60)),
            retry: RetryPolicies::default().without_jitter(),
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(
        ollama: Arc<ScriptedText>,
        openai: Arc<ScriptedText>,
    ) -> OrchestratorBuilder<TextGeneration> {
        Orchestrator::<TextGeneration>::builder(config())
            .provider(ProviderId::Ollama, ollama)
            .provider(ProviderId::OpenAi, openai)
            .route(
                Operation::QuestionGeneration,
                [ProviderId::Ollama, ProviderId::OpenAi],
            )
    }

    fn request() -> TextRequest {
        TextRequest::new("Generate questions", 256)
    }

    #[tokio::test(start_paused = true)]
    async fn first_healthy_provider_serves_request() {
        let ollama = ScriptedText::ok("local answer");
        let openai = ScriptedText::ok("remote answer");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();

        assert_eq!(result.data, "local answer");
        assert_eq!(result.provider_used, Some(ProviderId::Ollama));
        assert!(!result.degraded);
        assert!(!result.cached);
        assert_eq!(result.retries_used, 0);
        assert_eq!(openai.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_advances_without_retry() {
        let ollama = ScriptedText::failing("401 Unauthorized: invalid API key");
        let openai = ScriptedText::ok("remote answer");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();

        assert_eq!(result.provider_used, Some(ProviderId::OpenAi));
        assert_eq!(result.retries_used, 0);
        assert_eq!(ollama.calls(), 1);

        let health = orch.get_health(ProviderId::Ollama).unwrap();
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(
            orch.get_health(ProviderId::OpenAi).unwrap().status,
            HealthStatus::Healthy
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_on_same_provider() {
        let ollama = ScriptedText::new(vec![
            Err("connection reset by peer"),
            Err("connection reset by peer"),
            Ok("recovered"),
        ]);
        let openai = ScriptedText::ok("remote answer");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        let started = Instant::now();
        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();

        assert_eq!(result.data, "recovered");
        assert_eq!(result.retries_used, 2);
        assert_eq!(ollama.calls(), 3);
        assert_eq!(openai.calls(), 0);
        // 1s + 2s of backoff without jitter
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(
            orch.get_health(ProviderId::Ollama).unwrap().consecutive_failures,
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_record_one_failure_and_advance() {
        let ollama = ScriptedText::failing("upstream timeout");
        let openai = ScriptedText::ok("remote answer");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();

        assert_eq!(ollama.calls(), 4);
        assert_eq!(result.retries_used, 3);
        assert_eq!(result.provider_used, Some(ProviderId::OpenAi));
        assert_eq!(
            orch.get_health(ProviderId::Ollama).unwrap().consecutive_failures,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_failing_with_fallback_returns_degraded() {
        let orch = orchestrator(
            ScriptedText::failing("403 forbidden"),
            ScriptedText::failing("400 bad request"),
        )
        .fallback(Operation::QuestionGeneration, |_| "canned".to_string())
        .build()
        .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();

        assert_eq!(result.data, "canned");
        assert!(result.degraded);
        assert_eq!(result.provider_used, None);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failing_without_fallback_is_unavailable() {
        let orch = orchestrator(
            ScriptedText::failing("403 forbidden"),
            ScriptedText::failing("invalid model"),
        )
        .build()
        .unwrap();

        let err = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::ServiceUnavailable {
                operation: Operation::QuestionGeneration
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_skips_provider() {
        let ollama = ScriptedText::failing("401 unauthorized");
        let openai = ScriptedText::ok("remote");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        for _ in 0..3 {
            orch.execute(Operation::QuestionGeneration, &request(), None)
                .await
                .unwrap();
        }
        assert_eq!(ollama.calls(), 3);
        assert_eq!(
            orch.get_health(ProviderId::Ollama).unwrap().status,
            HealthStatus::CircuitOpen
        );

        orch.execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();
        assert_eq!(ollama.calls(), 3);
        assert_eq!(openai.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breakers_with_fallback_degrade_without_calls() {
        let ollama = ScriptedText::failing("401 unauthorized");
        let openai = ScriptedText::failing("401 unauthorized");
        let orch = Orchestrator::<TextGeneration>::builder(OrchestratorConfig {
            circuit_breaker: CircuitBreakerConfig::custom(1, Duration::from_secs(60)),
            ..config()
        })
        .provider(ProviderId::Ollama, Arc::clone(&ollama) as Arc<dyn TextGenerationPort>)
        .provider(ProviderId::OpenAi, Arc::clone(&openai) as Arc<dyn TextGenerationPort>)
        .route(Operation::AnswerAnalysis, [ProviderId::Ollama, ProviderId::OpenAi])
        .fallback(Operation::AnswerAnalysis, |_| "neutral".to_string())
        .build()
        .unwrap();

        let first = orch
            .execute(Operation::AnswerAnalysis, &request(), None)
            .await
            .unwrap();
        assert!(first.degraded);

        let second = orch
            .execute(Operation::AnswerAnalysis, &request(), None)
            .await
            .unwrap();
        assert!(second.degraded);
        assert_eq!(ollama.calls(), 1);
        assert_eq!(openai.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_closes_breaker_on_success() {
        let ollama = ScriptedText::new(vec![Err("401 unauthorized"), Ok("back")]);
        let orch = Orchestrator::<TextGeneration>::builder(OrchestratorConfig {
            circuit_breaker: CircuitBreakerConfig::custom(1, Duration::from_secs(60)),
            ..config()
        })
        .provider(ProviderId::Ollama, Arc::clone(&ollama) as Arc<dyn TextGenerationPort>)
        .route(Operation::RoleAnalysis, [ProviderId::Ollama])
        .build()
        .unwrap();

        assert!(
            orch.execute(Operation::RoleAnalysis, &request(), None)
                .await
                .is_err()
        );
        tokio::time::advance(Duration::from_secs(61)).await;

        let result = orch
            .execute(Operation::RoleAnalysis, &request(), None)
            .await
            .unwrap();
        assert_eq!(result.data, "back");
        let health = orch.get_health(ProviderId::Ollama).unwrap();
        assert_eq!(health.circuit_state, CircuitState::Closed);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn preferred_provider_is_tried_first() {
        let ollama = ScriptedText::ok("local");
        let openai = ScriptedText::ok("remote");
        let orch = orchestrator(Arc::clone(&ollama), Arc::clone(&openai))
            .build()
            .unwrap();

        let result = orch
            .execute(
                Operation::QuestionGeneration,
                &request(),
                Some(ProviderId::OpenAi),
            )
            .await
            .unwrap();

        assert_eq!(result.provider_used, Some(ProviderId::OpenAi));
        assert_eq!(ollama.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_as_transient() {
        let ollama = ScriptedText::slow("late", Duration::from_secs(10));
        let openai = ScriptedText::ok("remote");
        let mut recorder = MockOutcomeRecorderPort::new();
        recorder
            .expect_record_attempt()
            .withf(|o| {
                o.provider == ProviderId::Ollama
                    && o.error_category == Some(ErrorCategory::Transient)
            })
            .times(1)
            .return_const(());
        recorder
            .expect_record_attempt()
            .withf(|o| o.provider == ProviderId::OpenAi && o.success)
            .times(1)
            .return_const(());

        let orch = Orchestrator::<TextGeneration>::builder(OrchestratorConfig {
            call_timeout: Duration::from_secs(1),
            retry: RetryPolicies::new(
                RetryPolicy::no_retry(),
                RetryPolicies::default_service_unavailable(),
                RetryPolicies::default_quota_exceeded(),
            ),
            ..config()
        })
        .provider(ProviderId::Ollama, Arc::clone(&ollama) as Arc<dyn TextGenerationPort>)
        .provider(ProviderId::OpenAi, openai as Arc<dyn TextGenerationPort>)
        .route(Operation::QuestionGeneration, [ProviderId::Ollama, ProviderId::OpenAi])
        .recorder(Arc::new(recorder))
        .build()
        .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();
        assert_eq!(result.provider_used, Some(ProviderId::OpenAi));
        assert_eq!(ollama.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_provider_timeout_overrides_default() {
        let ollama = ScriptedText::slow("late but fine", Duration::from_secs(45));
        let orch = Orchestrator::<TextGeneration>::builder(OrchestratorConfig {
            provider_timeouts: HashMap::from([(ProviderId::Ollama, Duration::from_secs(60))]),
            ..config()
        })
        .provider(ProviderId::Ollama, ollama as Arc<dyn TextGenerationPort>)
        .route(Operation::QuestionGeneration, [ProviderId::Ollama])
        .build()
        .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();
        assert_eq!(result.data, "late but fine");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_request_records_nothing() {
        let ollama = ScriptedText::slow("late", Duration::from_secs(10));
        let orch = Orchestrator::<TextGeneration>::builder(OrchestratorConfig {
            circuit_breaker: CircuitBreakerConfig::custom(1, Duration::from_secs(60)),
            ..config()
        })
        .provider(ProviderId::Ollama, Arc::clone(&ollama) as Arc<dyn TextGenerationPort>)
        .route(Operation::QuestionGeneration, [ProviderId::Ollama])
        .build()
        .unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_secs(1),
            orch.execute(Operation::QuestionGeneration, &request(), None),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(ollama.calls(), 1);

        let health = orch.get_health(ProviderId::Ollama).unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.circuit_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn unrouted_operation_is_rejected() {
        let orch = orchestrator(ScriptedText::ok("x"), ScriptedText::ok("y"))
            .build()
            .unwrap();
        let err = orch
            .execute(Operation::AnswerAnalysis, &request(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::UnroutedOperation { .. }));
    }

    #[test]
    fn build_rejects_provider_from_other_family() {
        let err = orchestrator(ScriptedText::ok("x"), ScriptedText::ok("y"))
            .provider(ProviderId::Coqui, ScriptedText::ok("z"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Configuration(_)));
    }

    #[test]
    fn build_rejects_route_to_unregistered_provider() {
        let err = Orchestrator::<TextGeneration>::builder(config())
            .provider(ProviderId::Ollama, ScriptedText::ok("x") as Arc<dyn TextGenerationPort>)
            .route(Operation::QuestionGeneration, [ProviderId::Ollama, ProviderId::Anthropic])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn build_rejects_operation_from_other_family() {
        let err = orchestrator(ScriptedText::ok("x"), ScriptedText::ok("y"))
            .route(Operation::SpeechSynthesis, [ProviderId::Ollama])
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Configuration(_)));
    }

    #[test]
    fn build_rejects_fallback_for_unrouted_operation() {
        let err = orchestrator(ScriptedText::ok("x"), ScriptedText::ok("y"))
            .fallback(Operation::RoleAnalysis, |_| String::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("role_analysis"));
    }

    #[test]
    fn build_rejects_empty_routes() {
        let err = Orchestrator::<TextGeneration>::builder(config())
            .build()
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_closes_all_breakers() {
        let ollama = ScriptedText::failing("401 unauthorized");
        let orch = orchestrator(Arc::clone(&ollama), ScriptedText::ok("remote"))
            .build()
            .unwrap();
        for _ in 0..3 {
            orch.execute(Operation::QuestionGeneration, &request(), None)
                .await
                .unwrap();
        }
        assert!(!orch.get_health(ProviderId::Ollama).unwrap().accepts_calls());

        orch.reset();

        for health in orch.health_snapshot().values() {
            assert_eq!(health.status, HealthStatus::Healthy);
            assert_eq!(health.circuit_state, CircuitState::Closed);
        }
        assert!(orch.reset_provider(ProviderId::Ollama));
        assert!(!orch.reset_provider(ProviderId::Anthropic));
    }

    #[tokio::test]
    async fn probe_health_reports_without_touching_breakers() {
        let mut down = MockTextGenerationPort::new();
        down.expect_health_check().times(1).returning(|| false);
        let mut up = MockTextGenerationPort::new();
        up.expect_health_check().times(1).returning(|| true);

        let orch = Orchestrator::<TextGeneration>::builder(config())
            .provider(ProviderId::Ollama, Arc::new(down) as Arc<dyn TextGenerationPort>)
            .provider(ProviderId::OpenAi, Arc::new(up) as Arc<dyn TextGenerationPort>)
            .route(Operation::QuestionGeneration, [ProviderId::Ollama, ProviderId::OpenAi])
            .build()
            .unwrap();

        let probes = orch.probe_health().await;
        assert_eq!(probes.get(&ProviderId::Ollama), Some(&false));
        assert_eq!(probes.get(&ProviderId::OpenAi), Some(&true));
        assert_eq!(
            orch.get_health(ProviderId::Ollama).unwrap().status,
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn mocked_provider_receives_prompt_and_budget() {
        let mut port = MockTextGenerationPort::new();
        port.expect_generate()
            .withf(|prompt, max_tokens| prompt == "Generate questions" && *max_tokens == 256)
            .times(1)
            .returning(|_, _| Ok("ok".to_string()));
        let mut recorder = MockOutcomeRecorderPort::new();
        recorder
            .expect_record_attempt()
            .with(always())
            .times(1)
            .return_const(());

        let orch = Orchestrator::<TextGeneration>::builder(config())
            .provider(ProviderId::Anthropic, Arc::new(port) as Arc<dyn TextGenerationPort>)
            .route(Operation::QuestionGeneration, [ProviderId::Anthropic])
            .recorder(Arc::new(recorder))
            .build()
            .unwrap();

        let result = orch
            .execute(Operation::QuestionGeneration, &request(), None)
            .await
            .unwrap();
        assert_eq!(result.data, "ok");
    }

    #[test]
    fn resolve_preferred_ignores_unknown_names() {
        let orch = orchestrator(ScriptedText::ok("x"), ScriptedText::ok("y"))
            .build()
            .unwrap();
        assert_eq!(orch.resolve_preferred(Some("OpenAI")), Some(ProviderId::OpenAi));
        assert_eq!(orch.resolve_preferred(Some("anthropic")), None);
        assert_eq!(orch.resolve_preferred(Some("mistral")), None);
        assert_eq!(orch.resolve_preferred(Some("  ")), None);
        assert_eq!(orch.resolve_preferred(None), None);
    }
}
