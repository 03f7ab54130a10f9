//! Network evaluator driving single evaluation passes.
//!
//! Invalid processors are visited in topological order; each gets its
//! on-change notifications, a readiness check, and a `process()` call. A
//! failing processor stays invalid and is reported, while independent
//! processors in the same pass still run.

use log::{debug, error, info};
use uuid::Uuid;

use crate::error::GraphError;
use crate::model::port::InvalidationLevel;
use crate::network::{analysis, ProcessorNetwork};
use crate::util::timing::{measure_debug, ScopedTimer};

/// Outcome of a single evaluation pass.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Processors whose `process()` ran and succeeded, in execution order.
    pub processed: Vec<Uuid>,
    /// Invalid processors skipped because they were not ready. Expected
    /// for disabled or partially connected nodes, not an error.
    pub skipped: Vec<Uuid>,
    /// Processors whose `process()` failed, with the reported error.
    pub failures: Vec<(Uuid, String)>,
}

impl EvaluationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct NetworkEvaluator;

impl NetworkEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Run one evaluation pass: recompute every currently invalid processor
    /// in dependency order. Running a second pass with no intervening
    /// change performs zero `process()` calls.
    pub fn evaluate(
        &mut self,
        network: &mut ProcessorNetwork,
    ) -> Result<EvaluationReport, GraphError> {
        let _pass = ScopedTimer::debug("evaluation pass");
        let order = analysis::topological_sort(network)?;
        let mut report = EvaluationReport::default();

        for id in order {
            if network.processor_level(id) == Some(InvalidationLevel::Valid) {
                continue;
            }
            let label = network.processor_label(id);

            // On-change notifications fire strictly before process() so a
            // processor can react to the transition separately from the
            // computation itself.
            network.call_on_change_if_changed(id);

            if !network.is_ready(id) {
                debug!("processor {} not ready, skipping", label);
                report.skipped.push(id);
                continue;
            }

            match measure_debug(format!("process {}", label), || network.run_processor(id)) {
                Ok(()) => {
                    network.set_valid(id);
                    report.processed.push(id);
                }
                Err(err) => {
                    error!("processor {} failed: {}", label, err);
                    network.mark_failed(id, &err.to_string());
                    report.failures.push((id, err.to_string()));
                }
            }
        }

        if !report.processed.is_empty() || !report.failures.is_empty() {
            info!(
                "evaluation pass: {} processed, {} skipped, {} failed",
                report.processed.len(),
                report.skipped.len(),
                report.failures.len()
            );
        }
        Ok(report)
    }
}
