use std::cell::Cell;
use std::rc::Rc;

use library::builtin::{Canvas, Invert, Luminance, NoiseSource};
use library::{
    GraphError, InvalidationLevel, NetworkEvaluator, NetworkSnapshot, PortKey, ProcessorNetwork,
    ProcessorStatus,
};

fn image_chain() -> (ProcessorNetwork, uuid::Uuid, uuid::Uuid, uuid::Uuid) {
    let mut net = ProcessorNetwork::new();
    let source = net.add_processor(NoiseSource::new());
    let invert = net.add_processor(Invert::new());
    let canvas = net.add_processor(Canvas::new());
    net.connect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(invert, "image_in"),
    )
    .unwrap();
    net.connect(
        &PortKey::new(invert, "image_out"),
        &PortKey::new(canvas, "image_in"),
    )
    .unwrap();
    (net, source, invert, canvas)
}

#[test]
fn test_single_connection_inport_rejects_second_edge() {
    let mut net = ProcessorNetwork::new();
    let first = net.add_processor(NoiseSource::new());
    let second = net.add_processor(NoiseSource::new());
    let invert = net.add_processor(Invert::new());

    net.connect(
        &PortKey::new(first, "image_out"),
        &PortKey::new(invert, "image_in"),
    )
    .unwrap();
    let err = net
        .connect(
            &PortKey::new(second, "image_out"),
            &PortKey::new(invert, "image_in"),
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Connection(_)));
    assert_eq!(net.connections().len(), 1);
}

#[test]
fn test_unknown_ports_are_rejected() {
    let (mut net, source, _invert, canvas) = image_chain();
    let before = net.connections().len();

    // canvas has no outport and a source has no inport
    let err = net
        .connect(
            &PortKey::new(canvas, "image_out"),
            &PortKey::new(source, "image_in"),
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Connection(_)));
    assert_eq!(net.connections().len(), before);
}

#[test]
fn test_cycle_between_filters_is_rejected() {
    let mut net = ProcessorNetwork::new();
    let a = net.add_processor(Invert::new());
    let b = net.add_processor(Invert::new());
    net.connect(&PortKey::new(a, "image_out"), &PortKey::new(b, "image_in"))
        .unwrap();
    let err = net
        .connect(&PortKey::new(b, "image_out"), &PortKey::new(a, "image_in"))
        .unwrap_err();
    assert!(matches!(err, GraphError::Cycle(_)));
    assert_eq!(net.connections().len(), 1);
}

#[test]
fn test_type_mismatch_is_rejected() {
    let mut net = ProcessorNetwork::new();
    let source = net.add_processor(NoiseSource::new());
    let luminance = net.add_processor(Luminance::new());
    let invert = net.add_processor(Invert::new());
    net.connect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(luminance, "image_in"),
    )
    .unwrap();

    // scalar outport cannot feed an image inport
    let err = net
        .connect(
            &PortKey::new(luminance, "value"),
            &PortKey::new(invert, "image_in"),
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Connection(_)));
}

#[test]
fn test_duplicate_and_self_connection_are_rejected() {
    let mut net = ProcessorNetwork::new();
    let source = net.add_processor(NoiseSource::new());
    let invert = net.add_processor(Invert::new());
    let from = PortKey::new(source, "image_out");
    let to = PortKey::new(invert, "image_in");

    net.connect(&from, &to).unwrap();
    assert!(net.connect(&from, &to).is_err());
    assert!(net
        .connect(
            &PortKey::new(invert, "image_out"),
            &PortKey::new(invert, "image_in")
        )
        .is_err());
    assert_eq!(net.connections().len(), 1);
}

#[test]
fn test_disconnect_makes_consumer_not_ready() {
    let (mut net, source, invert, _canvas) = image_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();
    assert_eq!(net.processor_status(invert), Some(ProcessorStatus::Valid));

    net.disconnect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(invert, "image_in"),
    )
    .unwrap();
    assert_eq!(net.processor_status(invert), Some(ProcessorStatus::NotReady));

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.skipped.contains(&invert));
}

#[test]
fn test_remove_processor_tears_down_edges() {
    let (mut net, _source, invert, _canvas) = image_chain();
    assert_eq!(net.connections().len(), 2);

    net.remove_processor(invert).unwrap();
    assert!(!net.contains_processor(invert));
    assert!(net.connections().is_empty());
    assert!(net
        .connections()
        .iter()
        .all(|c| c.from.processor != invert && c.to.processor != invert));
}

#[test]
fn test_remove_unknown_processor_fails() {
    let mut net = ProcessorNetwork::new();
    assert!(net.remove_processor(uuid::Uuid::new_v4()).is_err());
}

#[test]
fn test_predecessors_follow_edges_backward() {
    let (net, source, invert, canvas) = image_chain();
    assert_eq!(net.predecessors(canvas), vec![invert, source]);
    assert_eq!(net.predecessors(invert), vec![source]);
    assert!(net.predecessors(source).is_empty());
}

#[test]
fn test_snapshot_round_trip_restores_edges_and_properties() {
    let (mut net, source, invert, _canvas) = image_chain();
    net.set_property(source, "seed", 42i64).unwrap();

    let snapshot = net.snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();

    // diverge from the snapshot
    net.set_property(source, "seed", 0i64).unwrap();
    net.disconnect(
        &PortKey::new(source, "image_out"),
        &PortKey::new(invert, "image_in"),
    )
    .unwrap();
    assert_eq!(net.connections().len(), 1);

    let restored: NetworkSnapshot = serde_json::from_str(&json).unwrap();
    net.restore(&restored).unwrap();
    assert_eq!(net.connections().len(), 2);
    assert_eq!(
        net.properties(source).unwrap().get_integer("seed"),
        Some(42)
    );
}

#[test]
fn test_restore_rejects_unknown_processor() {
    let (net, _source, _invert, _canvas) = image_chain();
    let mut snapshot = net.snapshot();
    snapshot.processors[0].id = uuid::Uuid::new_v4();

    let mut other = ProcessorNetwork::new();
    other.add_processor(NoiseSource::new());
    assert!(other.restore(&snapshot).is_err());
}

#[test]
fn test_on_invalid_fires_once_per_transition() {
    let (mut net, source, invert, _canvas) = image_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    net.on_invalid(&PortKey::new(invert, "image_in"), move |_| {
        counter.set(counter.get() + 1);
    });

    net.set_property(source, "seed", 1i64).unwrap();
    net.set_property(source, "seed", 2i64).unwrap();
    assert_eq!(fired.get(), 1);

    // revalidate, then invalidate again: a fresh transition fires again
    evaluator.evaluate(&mut net).unwrap();
    net.set_property(source, "seed", 3i64).unwrap();
    assert_eq!(fired.get(), 2);
}

#[test]
fn test_callback_removal_stops_delivery() {
    let (mut net, source, invert, _canvas) = image_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    let port = PortKey::new(invert, "image_in");
    let handle = net.on_invalid(&port, move |_| {
        counter.set(counter.get() + 1);
    });
    net.remove_on_invalid(&port, handle);

    net.set_property(source, "seed", 1i64).unwrap();
    assert_eq!(fired.get(), 0);
}

#[test]
fn test_invalidation_cascades_downstream() {
    let (mut net, source, invert, canvas) = image_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();
    assert_eq!(
        net.processor_level(canvas),
        Some(InvalidationLevel::Valid)
    );

    net.set_property(source, "seed", 9i64).unwrap();
    assert_eq!(
        net.processor_level(invert),
        Some(InvalidationLevel::InvalidOutput)
    );
    assert_eq!(
        net.processor_level(canvas),
        Some(InvalidationLevel::InvalidOutput)
    );
}

#[test]
fn test_outport_invalidation_reaches_valid_after_one_pass() {
    let (mut net, source, invert, canvas) = image_chain();
    let mut evaluator = NetworkEvaluator::new();
    evaluator.evaluate(&mut net).unwrap();

    net.invalidate_outport(
        &PortKey::new(source, "image_out"),
        InvalidationLevel::InvalidOutput,
    );
    for id in [source, invert, canvas] {
        assert_eq!(
            net.processor_level(id),
            Some(InvalidationLevel::InvalidOutput)
        );
    }

    let report = evaluator.evaluate(&mut net).unwrap();
    assert!(report.is_clean());
    for id in [source, invert, canvas] {
        assert_eq!(net.processor_level(id), Some(InvalidationLevel::Valid));
    }
}

#[test]
fn test_higher_level_subsumes_lower() {
    let (mut net, source, invert, _canvas) = image_chain();
    net.invalidate_processor(source, InvalidationLevel::InvalidResources);
    assert_eq!(
        net.processor_level(invert),
        Some(InvalidationLevel::InvalidResources)
    );
    // a lower level afterwards does not downgrade anything
    net.invalidate_processor(source, InvalidationLevel::InvalidOutput);
    assert_eq!(
        net.processor_level(invert),
        Some(InvalidationLevel::InvalidResources)
    );
}
