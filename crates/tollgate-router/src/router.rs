// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request routing with escalation and budget-gated cloud admission.
//!
//! Local tier first. On a backend failure or a degenerate answer the local
//! tier escalates to its mapped cloud tier, but only if the budget gate
//! admits the call. A refused or failed cloud call substitutes the
//! configured local fallback tiers instead of returning the bad answer.
//! Only configuration and credential errors reach the caller unconditionally.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tollgate_config::TollgateConfig;
use tollgate_core::{
    ChunkSink, Completion, CompletionRequest, Message, ProviderAdapter, ProviderKind, Response,
    TollgateError, ToolSchema,
};
use tollgate_health::HealthMonitor;
use tollgate_usage::pricing::{calculate_cost, estimate_cost, estimate_prompt_tokens};
use tollgate_usage::{BudgetGate, Reservation, UsageLedger};
use tracing::{debug, error, info, warn};

use crate::classifier::{TierClassifier, TierResolution};
use crate::quality::{QualityCheck, QualityVerdict};

/// How the answering tier was reached. Reported as `metadata.route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Route {
    /// The resolved tier answered.
    Direct,
    /// A local tier escalated to its cloud tier.
    Escalated,
    /// The budget gate refused the cloud call; a local fallback answered.
    BudgetSubstitute,
    /// The cloud call failed; a local fallback answered.
    CloudFailureSubstitute,
    /// Nothing better was available; a low-quality local answer is returned.
    Degraded,
}

/// Why the resolved tier did not answer. Reported as `metadata.escalation_cause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EscalationCause {
    ConnectionError,
    BackendError,
    MalformedOutput,
    EmptyOutput,
    RepetitiveOutput,
    LocalUnhealthy,
    BudgetExhausted,
}

impl EscalationCause {
    fn from_error(err: &TollgateError) -> Self {
        match err {
            TollgateError::Connection { .. } => EscalationCause::ConnectionError,
            TollgateError::Provider { .. } => EscalationCause::MalformedOutput,
            _ => EscalationCause::BackendError,
        }
    }

    fn from_verdict(verdict: QualityVerdict) -> Option<Self> {
        match verdict {
            QualityVerdict::Acceptable => None,
            QualityVerdict::Empty => Some(EscalationCause::EmptyOutput),
            QualityVerdict::Repetitive { .. } => Some(EscalationCause::RepetitiveOutput),
        }
    }
}

/// One routed call: the conversation plus routing hints.
#[derive(Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    /// Explicit tier override, honored verbatim.
    pub tier: Option<String>,
    /// Skill label; mapped to a tier and recorded in the ledger.
    pub skill: Option<String>,
    /// Free text scanned for keyword signals.
    pub user_message: Option<String>,
    pub tools: Vec<ToolSchema>,
    pub system: Option<String>,
    pub stream: bool,
    pub on_chunk: Option<ChunkSink>,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Stream text deltas to `on_chunk` while the call is in flight.
    pub fn streaming(mut self, on_chunk: ChunkSink) -> Self {
        self.stream = true;
        self.on_chunk = Some(on_chunk);
        self
    }
}

impl fmt::Debug for GenerateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateRequest")
            .field("messages", &self.messages.len())
            .field("tier", &self.tier)
            .field("skill", &self.skill)
            .field("user_message", &self.user_message)
            .field("tools", &self.tools.len())
            .field("stream", &self.stream)
            .field("on_chunk", &self.on_chunk.is_some())
            .finish()
    }
}

/// Where a call ended up.
struct Routed {
    tier: String,
    completion: Completion,
    route: Route,
    cause: Option<EscalationCause>,
    /// Budget held for the cloud call that answered, until it is recorded.
    hold: Option<Reservation>,
}

/// A low-quality answer held back in case nothing better arrives.
struct Degraded {
    tier: String,
    completion: Completion,
    verdict: QualityVerdict,
}

impl Degraded {
    /// Any text outranks an empty answer; after that a substitute tier
    /// outranks the tier that was originally resolved.
    fn rank(&self, origin: &str) -> (bool, bool) {
        (
            !matches!(self.verdict, QualityVerdict::Empty),
            self.tier != origin,
        )
    }
}

impl Routed {
    fn direct(tier: &str, completion: Completion) -> Self {
        Self {
            tier: tier.to_string(),
            completion,
            route: Route::Direct,
            cause: None,
            hold: None,
        }
    }
}

/// The sole decision point for which backend answers a request.
///
/// Holds no per-call mutable state; `generate()` may run concurrently.
/// The only shared state is the budget gate's in-flight holds.
pub struct Router {
    config: Arc<TollgateConfig>,
    classifier: TierClassifier,
    quality: QualityCheck,
    providers: BTreeMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    ledger: UsageLedger,
    budget: BudgetGate,
    health: Option<Arc<HealthMonitor>>,
}

impl Router {
    pub fn new(config: Arc<TollgateConfig>, ledger: UsageLedger) -> Self {
        Self {
            classifier: TierClassifier::new(config.clone()),
            quality: QualityCheck::new(config.quality.clone()),
            budget: BudgetGate::new(&config.cost, ledger.clone()),
            providers: BTreeMap::new(),
            ledger,
            health: None,
            config,
        }
    }

    /// Register the adapter serving all tiers of its kind.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Consult this monitor's cached snapshot before local calls. A snapshot
    /// older than the monitor's interval is ignored and refreshed in the
    /// background.
    pub fn with_health_monitor(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.health = Some(monitor);
        self
    }

    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Resolve a tier from routing hints without calling any backend.
    pub fn resolve_tier(
        &self,
        explicit_tier: Option<&str>,
        skill: Option<&str>,
        message: Option<&str>,
    ) -> Result<TierResolution, TollgateError> {
        self.classifier.resolve(explicit_tier, skill, message)
    }

    /// Route one request and record the answer in the usage ledger.
    pub async fn generate(&self, request: GenerateRequest) -> Result<Response, TollgateError> {
        let started = Instant::now();
        let resolution = self.resolve_tier(
            request.tier.as_deref(),
            request.skill.as_deref(),
            request.user_message.as_deref(),
        )?;
        let origin = resolution.tier.as_str();
        debug!(tier = origin, source = %resolution.source, "tier resolved");

        let mut routed = match self.config.tier(origin)?.backend {
            ProviderKind::Local => self.route_local(origin, &request).await?,
            ProviderKind::Cloud => self.route_cloud(origin, &request).await?,
        };
        let hold = routed.hold.take();

        let response = self.build_response(&resolution, routed, started)?;
        if let Err(e) = self.ledger.record(&response, request.skill.as_deref()).await {
            error!(error = %e, tier = %response.tier, "failed to record usage");
        }
        // The recorded cost now stands in for the held estimate.
        drop(hold);
        Ok(response)
    }

    async fn route_local(
        &self,
        origin: &str,
        request: &GenerateRequest,
    ) -> Result<Routed, TollgateError> {
        let cached_health = self.health.as_ref().and_then(|monitor| {
            monitor.spawn_refresh_if_due();
            monitor.cached_local_healthy()
        });
        if cached_health == Some(false) {
            info!(tier = origin, "local backend marked unhealthy, skipping local call");
            return self
                .escalate(origin, request, EscalationCause::LocalUnhealthy, None)
                .await;
        }

        match self.call_tier(origin, request).await {
            Ok(completion) => {
                let verdict = self.quality.assess(&completion);
                match EscalationCause::from_verdict(verdict) {
                    None => Ok(Routed::direct(origin, completion)),
                    Some(cause) => {
                        warn!(tier = origin, ?verdict, "local output failed quality check");
                        let degraded = Degraded {
                            tier: origin.to_string(),
                            completion,
                            verdict,
                        };
                        self.escalate(origin, request, cause, Some(degraded))
                            .await
                    }
                }
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(tier = origin, error = %e, "local tier failed");
                self.escalate(origin, request, EscalationCause::from_error(&e), None)
                    .await
            }
        }
    }

    async fn route_cloud(
        &self,
        origin: &str,
        request: &GenerateRequest,
    ) -> Result<Routed, TollgateError> {
        if let Some(hold) = self.admit(origin, request).await? {
            // A direct cloud failure is terminal.
            let completion = self.call_tier(origin, request).await?;
            return Ok(Routed {
                hold: Some(hold),
                ..Routed::direct(origin, completion)
            });
        }
        self.substitute(
            origin,
            request,
            Route::BudgetSubstitute,
            EscalationCause::BudgetExhausted,
            None,
            None,
        )
        .await
    }

    async fn escalate(
        &self,
        origin: &str,
        request: &GenerateRequest,
        cause: EscalationCause,
        degraded: Option<Degraded>,
    ) -> Result<Routed, TollgateError> {
        let Some(target) = self.config.escalation_target(origin) else {
            return Err(TollgateError::Config(format!(
                "local tier `{origin}` has no escalation target"
            )));
        };

        let Some(hold) = self.admit(target, request).await? else {
            info!(
                from = origin,
                to = target,
                cause = %cause,
                "escalation refused by budget gate, substituting local tier"
            );
            return self
                .substitute(origin, request, Route::BudgetSubstitute, cause, degraded, None)
                .await;
        };

        info!(from = origin, to = target, cause = %cause, "escalating to cloud tier");
        match self.call_tier(target, request).await {
            Ok(completion) => Ok(Routed {
                tier: target.to_string(),
                completion,
                route: Route::Escalated,
                cause: Some(cause),
                hold: Some(hold),
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                drop(hold);
                warn!(tier = target, error = %e, "cloud escalation failed, substituting local tier");
                self.substitute(
                    origin,
                    request,
                    Route::CloudFailureSubstitute,
                    cause,
                    degraded,
                    Some(e),
                )
                .await
            }
        }
    }

    /// Walk the fallback tiers, skipping `origin`. The first acceptable
    /// answer wins; otherwise the best-ranked low-quality answer is returned
    /// as degraded, or the last error if nothing answered at all.
    async fn substitute(
        &self,
        origin: &str,
        request: &GenerateRequest,
        route: Route,
        cause: EscalationCause,
        mut degraded: Option<Degraded>,
        mut last_error: Option<TollgateError>,
    ) -> Result<Routed, TollgateError> {
        for fallback in &self.config.routing.budget_fallback_tiers {
            if fallback == origin {
                continue;
            }
            match self.call_tier(fallback, request).await {
                Ok(completion) => {
                    let verdict = self.quality.assess(&completion);
                    if verdict.is_acceptable() {
                        info!(from = origin, to = %fallback, route = %route, "substitute tier answered");
                        return Ok(Routed {
                            tier: fallback.clone(),
                            completion,
                            route,
                            cause: Some(cause),
                            hold: None,
                        });
                    }
                    debug!(tier = %fallback, ?verdict, "substitute output failed quality check");
                    let candidate = Degraded {
                        tier: fallback.clone(),
                        completion,
                        verdict,
                    };
                    if degraded
                        .as_ref()
                        .is_none_or(|kept| candidate.rank(origin) > kept.rank(origin))
                    {
                        degraded = Some(candidate);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(tier = %fallback, error = %e, "substitute tier failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(Degraded {
            tier, completion, ..
        }) = degraded
        {
            warn!(from = origin, tier = %tier, "no acceptable answer, returning degraded output");
            return Ok(Routed {
                tier,
                completion,
                route: Route::Degraded,
                cause: Some(cause),
                hold: None,
            });
        }

        Err(last_error.unwrap_or_else(|| {
            TollgateError::Internal(format!(
                "no fallback tier available for `{origin}` ({cause})"
            ))
        }))
    }

    /// Ask the budget gate to hold budget for a call to a cloud tier.
    /// `None` when the gate refuses.
    async fn admit(
        &self,
        tier: &str,
        request: &GenerateRequest,
    ) -> Result<Option<Reservation>, TollgateError> {
        let tier_config = self.config.tier(tier)?;
        let prompt_tokens = estimate_prompt_tokens(&request.messages, request.system.as_deref());
        let estimate = estimate_cost(
            prompt_tokens,
            tier_config.max_tokens,
            tier_config.pricing.as_ref(),
        );
        match self.budget.reserve(estimate).await {
            Ok(hold) => Ok(Some(hold)),
            Err(denied) => {
                debug!(tier, ?denied, "cloud call denied");
                Ok(None)
            }
        }
    }

    async fn call_tier(
        &self,
        tier: &str,
        request: &GenerateRequest,
    ) -> Result<Completion, TollgateError> {
        let tier_config = self.config.tier(tier)?;
        let provider = self.providers.get(&tier_config.backend).ok_or_else(|| {
            TollgateError::Config(format!(
                "no {} provider registered for tier `{tier}`",
                tier_config.backend
            ))
        })?;

        debug!(tier, model = %tier_config.model, provider = provider.name(), "calling provider");
        provider
            .generate(
                CompletionRequest {
                    model: tier_config.model.clone(),
                    messages: request.messages.clone(),
                    tools: request.tools.clone(),
                    system: request.system.clone(),
                    max_tokens: tier_config.max_tokens,
                    temperature: tier_config.temperature,
                    context_window: Some(tier_config.context_window),
                    stream: request.stream,
                },
                request.on_chunk.clone(),
            )
            .await
    }

    fn build_response(
        &self,
        resolution: &TierResolution,
        routed: Routed,
        started: Instant,
    ) -> Result<Response, TollgateError> {
        let tier_config = self.config.tier(&routed.tier)?;
        let cost_usd = match tier_config.backend {
            ProviderKind::Cloud => {
                calculate_cost(&routed.completion.usage, tier_config.pricing.as_ref())
            }
            ProviderKind::Local => 0.0,
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("route".to_string(), Value::from(routed.route.to_string()));
        metadata.insert(
            "tier_source".to_string(),
            Value::from(resolution.source.to_string()),
        );
        if let Some(cause) = routed.cause {
            metadata.insert("escalation_cause".to_string(), Value::from(cause.to_string()));
        }

        let escalated_from = (routed.tier != resolution.tier).then(|| resolution.tier.clone());
        let completion = routed.completion;
        Ok(Response {
            content: completion.content,
            tool_calls: completion.tool_calls,
            usage: completion.usage,
            provider: tier_config.backend,
            tier: routed.tier,
            model: completion.model,
            finish_reason: completion.finish_reason,
            cost_usd,
            escalated_from,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            metadata,
        })
    }
}
