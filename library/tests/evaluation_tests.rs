use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use library::builtin::{Add, Canvas, Invert, Luminance, NoiseSource, SolidSource};
use library::{
    GraphError, InvalidationLevel, NetworkEvaluator, PortDataType, PortDefinition, PortKey,
    ProcessContext, ProcessorCategory, ProcessorKernel, ProcessorNetwork, ProcessorStatus,
    ProcessorTypeDefinition,
};

/// Image filter that counts and logs its `process()` calls.
struct ProbeFilter {
    definition: ProcessorTypeDefinition,
    calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ProbeFilter {
    fn new(calls: Arc<AtomicUsize>, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "test.probe",
                "Probe",
                ProcessorCategory::Filter,
            )
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )])
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )]),
            calls,
            log,
        }
    }
}

impl ProcessorKernel for ProbeFilter {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("process");
        let input = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("probe: no input"))?;
        ctx.write_image("image_out", (*input).clone())
    }
}

/// Source that always fails.
struct FailingSource {
    definition: ProcessorTypeDefinition,
}

impl FailingSource {
    fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "test.failing",
                "Failing",
                ProcessorCategory::Source,
            )
            .with_outputs(vec![PortDefinition::output(
                "value",
                "Value",
                PortDataType::Scalar,
            )]),
        }
    }
}

impl ProcessorKernel for FailingSource {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        Err(GraphError::processing("deliberate failure"))
    }
}

fn probe_chain() -> (
    ProcessorNetwork,
    uuid::Uuid,
    uuid::Uuid,
    Arc<AtomicUsize>,
    Arc<Mutex<Vec<&'static str>>>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut net = ProcessorNetwork::new();
    let source = net.add_processor(NoiseSource::new());
    let probe = net.add_processor(ProbeFilter::new(calls.clone(), log.clone()));
    net.connect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(probe, "image_in"),
    )
    .unwrap();
    (net, source, probe, calls, log)
}

#[test]
fn test_second_pass_does_no_work() {
    let (mut net, _source, probe, calls, _log) = probe_chain();
    let mut evaluator = NetworkEvaluator::new();

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.is_clean());
    assert!(report.processed.contains(&probe));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_property_change_recomputes_downstream_only() {
    let (mut net, source, _probe, calls, _log) = probe_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();

    net.set_property(source, "seed", 5i64).unwrap();
    evaluator.evaluate(&mut net).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_not_ready_processor_is_skipped_not_validated() {
    let mut net = ProcessorNetwork::new();
    let invert = net.add_processor(Invert::new());
    let mut evaluator = NetworkEvaluator::new();

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.skipped.contains(&invert));
    assert_ne!(
        net.processor_level(invert),
        Some(InvalidationLevel::Valid)
    );

    // still skipped on the next pass, never silently validated
    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.skipped.contains(&invert));
}

#[test]
fn test_disabled_processor_is_skipped() {
    let (mut net, _source, probe, calls, _log) = probe_chain();
    net.set_enabled(probe, false);
    let mut evaluator = NetworkEvaluator::new();

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.skipped.contains(&probe));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // re-enabling invalidates and the next pass picks it up
    net.set_enabled(probe, true);
    evaluator.evaluate(&mut net).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_is_isolated_from_independent_processors() {
    let mut net = ProcessorNetwork::new();
    let failing = net.add_processor(FailingSource::new());
    let source = net.add_processor(NoiseSource::new());
    let canvas = net.add_processor(Canvas::new());
    net.connect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(canvas, "image_in"),
    )
    .unwrap();

    let mut evaluator = NetworkEvaluator::new();
    let report = evaluator.evaluate(&mut net).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, failing);
    assert!(report.processed.contains(&source));
    assert!(report.processed.contains(&canvas));

    match net.processor_status(failing) {
        Some(ProcessorStatus::Error(msg)) => assert!(msg.contains("deliberate failure")),
        other => panic!("unexpected status {:?}", other),
    }
}

#[test]
fn test_failed_processor_is_retried() {
    let mut net = ProcessorNetwork::new();
    let failing = net.add_processor(FailingSource::new());
    let mut evaluator = NetworkEvaluator::new();

    let report = evaluator.evaluate(&mut net).unwrap();
    assert_eq!(report.failures.len(), 1);
    let report = evaluator.evaluate(&mut net).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, failing);
}

#[test]
fn test_on_change_fires_before_process() {
    let (mut net, _source, probe, _calls, log) = probe_chain();
    let observer = log.clone();
    net.on_change(&PortKey::new(probe, "image_in"), move |_| {
        observer.lock().unwrap().push("change");
    });

    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();

    let entries = log.lock().unwrap();
    let change = entries.iter().position(|e| *e == "change").unwrap();
    let process = entries.iter().position(|e| *e == "process").unwrap();
    assert!(change < process);
}

#[test]
fn test_scalar_pipeline_end_to_end() {
    let mut net = ProcessorNetwork::new();
    let solid = net.add_processor(SolidSource::new());
    let luminance = net.add_processor(Luminance::new());
    let add = net.add_processor(Add::new());
    net.set_property(solid, "value", 1.0).unwrap();
    net.set_property(add, "bias", 0.25).unwrap();
    net.connect(
        &PortKey::new(solid, "image_out"),
        &PortKey::new(luminance, "image_in"),
    )
    .unwrap();
    net.connect(&PortKey::new(luminance, "value"), &PortKey::new(add, "a"))
        .unwrap();

    let mut evaluator = NetworkEvaluator::new();
    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.is_clean());
    // "b" is optional and disconnected, treated as zero
    assert!(report.processed.contains(&add));
}
