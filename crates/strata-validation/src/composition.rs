use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use strata_core::{ValidationConfig, DEFAULT_PERFORMANCE_BUDGET_MS};
use strata_protocol::{ComposedObject, ValidationResult};
use tracing::{debug, warn};

use crate::rules::{builtin_rules, CompositionRule, RuleContext};

/// Runs semantic rules over a composed object and times each run against a soft budget.
pub struct CompositionValidator {
    rules: Vec<Box<dyn CompositionRule>>,
    context: RuleContext,
    budget: Duration,
    last_elapsed_ns: AtomicU64,
    last_within_budget: AtomicBool,
}

impl Default for CompositionValidator {
    fn default() -> Self {
        Self::new(RuleContext::default(), Duration::from_millis(DEFAULT_PERFORMANCE_BUDGET_MS))
    }
}

impl std::fmt::Debug for CompositionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionValidator")
            .field("rules", &self.rule_names())
            .field("budget", &self.budget)
            .finish()
    }
}

impl CompositionValidator {
    pub fn new(context: RuleContext, budget: Duration) -> Self {
        Self {
            rules: builtin_rules(),
            context,
            budget,
            last_elapsed_ns: AtomicU64::new(0),
            last_within_budget: AtomicBool::new(true),
        }
    }

    pub fn from_config(cfg: &ValidationConfig) -> Self {
        Self::new(
            RuleContext::new(cfg.known_regions.iter().cloned()),
            Duration::from_millis(cfg.performance_budget_ms),
        )
    }

    pub fn add_rule(&mut self, rule: impl CompositionRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, composed: &ComposedObject) -> ValidationResult {
        let started = Instant::now();
        let issues = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(composed, &self.context))
            .collect();
        let elapsed = started.elapsed();
        let within = elapsed <= self.budget;
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.last_elapsed_ns.store(nanos, Ordering::Relaxed);
        self.last_within_budget.store(within, Ordering::Relaxed);

        let result = ValidationResult::from_issues(issues);
        if !within {
            warn!(
                object = %composed.name,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "composition validation exceeded budget"
            );
        }
        debug!(
            object = %composed.name,
            errors = result.summary.errors,
            warnings = result.summary.warnings,
            elapsed_us = nanos / 1_000,
            "composition validation"
        );
        result
    }

    /// Duration of the most recent `validate` call.
    pub fn last_elapsed(&self) -> Duration {
        Duration::from_nanos(self.last_elapsed_ns.load(Ordering::Relaxed))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Verdict of the most recent `validate` call; the same comparison drives its overrun warning.
    pub fn is_within_performance_budget(&self) -> bool {
        self.last_within_budget.load(Ordering::Relaxed)
    }
}
