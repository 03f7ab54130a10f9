use std::error::Error;
use std::sync::{Arc, Mutex};

use library::builtin::{Canvas, Invert, NoiseSource};
use library::{ImageDims, NetworkEvaluator, PortKey, ProcessorNetwork};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut network = ProcessorNetwork::new();
    let noise = network.add_processor(NoiseSource::new());
    let invert = network.add_processor(Invert::new());
    let capture = Arc::new(Mutex::new(None));
    let canvas = network.add_processor(Canvas::with_capture(capture.clone()));

    network.connect(
        &PortKey::new(noise, "image_out"),
        &PortKey::new(invert, "image_in"),
    )?;
    network.connect(
        &PortKey::new(invert, "image_out"),
        &PortKey::new(canvas, "image_in"),
    )?;
    network.set_requested_dims(&PortKey::new(canvas, "image_in"), ImageDims::new(256, 256))?;

    let mut evaluator = NetworkEvaluator::new();
    let report = evaluator.evaluate(&mut network)?;
    println!(
        "first pass: {} processed, {} skipped, {} failed",
        report.processed.len(),
        report.skipped.len(),
        report.failures.len()
    );

    if let Some(frame) = capture.lock().ok().and_then(|g| g.clone()) {
        println!("canvas frame: {}", frame.dims());
    }

    // Nothing changed; a second pass does no work.
    let report = evaluator.evaluate(&mut network)?;
    println!("second pass: {} processed", report.processed.len());

    Ok(())
}
