//! Pipeline and pump tests: line validation, push loop, structural
//! deduplication and result harvesting.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use wavegraph::prelude::*;
use wavegraph::window;

fn mono_frame(index: u64, samples: Vec<f32>, sample_rate: f32) -> RealFrame {
    RealFrame::new(index, samples, AudioFormat::mono(sample_rate))
}

fn ramp_frames(total: usize, per_frame: usize) -> Vec<RealFrame> {
    (0..total / per_frame)
        .map(|chunk| {
            let samples = (0..per_frame)
                .map(|i| (chunk * per_frame + i) as f32)
                .collect();
            mono_frame((chunk * per_frame) as u64, samples, 1000.0)
        })
        .collect()
}

#[test]
fn pipeline_requires_a_straight_line() {
    let mono = shared(Mono::new());
    let hamming = shared(window::mapping(WindowFunction::Hamming));
    let tail = shared(SlidingWindow::new(4).unwrap());
    mono.borrow_mut().connect_to(hamming.clone());
    hamming.borrow_mut().connect_to(tail.clone());
    assert!(Pipeline::new(mono.clone(), tail.clone()).is_ok());

    // A second child inside the chain breaks the line.
    hamming
        .borrow_mut()
        .connect_to(shared(SlidingWindow::new(8).unwrap()));
    assert!(Pipeline::new(mono, tail).is_err());
}

#[test]
fn pipeline_forwards_and_reports_the_tail() {
    let mono = shared(Mono::new());
    let tail = shared(SlidingWindow::new(4).unwrap().with_id("slices"));
    mono.borrow_mut().connect_to(tail.clone());
    let mut pipeline = Pipeline::new(mono, tail).unwrap();
    assert_eq!(pipeline.id(), Some("slices"));

    pipeline
        .process(&mono_frame(0, (0..6).map(|x| x as f32).collect(), 1000.0))
        .unwrap();
    pipeline.flush().unwrap();

    let value = pipeline.output().unwrap();
    let slice = value.as_real().unwrap();
    // The flush drained the two-sample residue zero-padded.
    assert_eq!(slice.real(), &[4.0, 5.0, 0.0, 0.0]);
    assert!(pipeline.contains_id("slices"));
    assert!(!pipeline.contains_id("nope"));
    assert!(pipeline.find("slices").is_some());
}

#[test]
fn pump_without_a_source_fails() {
    let mut pump: Pump<RealFrame> = Pump::new();
    pump.add(shared(Mono::new()));
    assert!(matches!(pump.pump(), Err(Error::NoSource)));
}

#[test]
fn pump_runs_an_fft_chain() {
    let mut pump = Pump::new();
    pump.set_signal_source(Box::new(BufferSource::new(vec![mono_frame(
        100,
        vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0],
        10000.0,
    )])));
    pump.add(shared(Fft::new().with_id("fft")));
    let results = pump.pump().unwrap();

    let spectrum = results["fft"].as_linear().unwrap();
    assert_eq!(spectrum.frame_index(), 100);
    let magnitudes = spectrum.magnitudes();
    assert!((magnitudes[0] - 12.0).abs() < 1e-4);
    for magnitude in &magnitudes[1..] {
        assert!(magnitude.abs() < 1e-4);
    }
}

#[test]
fn pump_deduplicates_structural_prefixes() {
    let mono1 = shared(Mono::new());
    let hamming1 = shared(window::mapping(WindowFunction::Hamming));
    let window1 = shared(SlidingWindow::new(128).unwrap().with_id("sw1"));
    mono1.borrow_mut().connect_to(hamming1.clone());
    hamming1.borrow_mut().connect_to(window1);

    let mono2 = shared(Mono::new());
    let hamming2 = shared(window::mapping(WindowFunction::Hamming));
    let window2 = shared(SlidingWindow::with_hop(256, 64).unwrap().with_id("sw2"));
    mono2.borrow_mut().connect_to(hamming2.clone());
    hamming2.borrow_mut().connect_to(window2);

    let mut pump = Pump::new();
    pump.set_signal_source(Box::new(BufferSource::new(ramp_frames(512, 128))));
    pump.add(mono1);
    pump.add(mono2);

    // The two Mono roots merge; the mappings stay distinct because
    // their functions cannot be compared.
    let description = pump.description();
    let expected = concat!(
        "Mono\n",
        "  Mapping{function=Hamming}\n",
        "    SlidingWindow{id=sw1, sliceLength=128, hop=128}\n",
        "  Mapping{function=Hamming}\n",
        "    SlidingWindow{id=sw2, sliceLength=256, hop=64}\n",
    );
    assert_eq!(description, expected);
    assert_eq!(description.matches("Mono").count(), 1);

    let results = pump.pump().unwrap();
    // Both windows saw the whole stream through the shared prefix.
    let last1 = results["sw1"].as_real().unwrap();
    assert_eq!(last1.frame_index(), 384);
    assert_eq!(last1.len(), 128);
    let last2 = results["sw2"].as_real().unwrap();
    assert_eq!(last2.frame_index(), 448);
    assert_eq!(last2.len(), 256);
    // Unidentified nodes do not appear in the result map.
    assert_eq!(results.len(), 2);
}

#[test]
fn pump_accepts_a_pipeline_root() {
    let mono = shared(Mono::new());
    let tail = shared(SlidingWindow::new(4).unwrap().with_id("slices"));
    mono.borrow_mut().connect_to(tail.clone());
    let pipeline = Pipeline::new(mono, tail).unwrap();

    let mut pump = Pump::new();
    pump.set_signal_source(Box::new(BufferSource::new(ramp_frames(8, 8))));
    pump.add(shared(pipeline));
    let results = pump.pump().unwrap();
    assert_eq!(results["slices"].as_real().unwrap().real(), &[4.0, 5.0, 6.0, 7.0]);
}

/// A source that fails after a few frames.
struct FailingSource {
    remaining: usize,
}

impl Source for FailingSource {
    type Output = RealFrame;

    fn read(&mut self) -> Result<Option<RealFrame>> {
        if self.remaining == 0 {
            return Err(Error::Io(std::io::Error::other("stream torn down")));
        }
        self.remaining -= 1;
        Ok(Some(mono_frame(0, vec![0.0; 4], 1000.0)))
    }

    fn reset(&mut self) {}
}

/// Flush counter used to observe the abort path.
struct FlushCounter {
    flushes: Rc<RefCell<usize>>,
}

impl GraphNode for FlushCounter {
    fn id(&self) -> Option<&str> {
        None
    }
    fn output_value(&self) -> Option<Value> {
        None
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn shallow_equals(&self, _other: &dyn GraphNode) -> bool {
        false
    }
    fn merge_from(&mut self, _other: &dyn GraphNode) {}
    fn describe(&self) -> String {
        "FlushCounter".into()
    }
    fn for_each_child(&self, _f: &mut dyn FnMut(&dyn GraphNode)) {}
}

impl Sink for FlushCounter {
    type Input = RealFrame;

    fn process(&mut self, _input: &RealFrame) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        *self.flushes.borrow_mut() += 1;
        Ok(())
    }
}

#[test]
fn source_errors_abort_the_pump_without_flush() {
    let flushes = Rc::new(RefCell::new(0));
    let mut pump = Pump::new();
    pump.set_signal_source(Box::new(FailingSource { remaining: 3 }));
    pump.add(shared(FlushCounter {
        flushes: flushes.clone(),
    }));
    assert!(pump.pump().is_err());
    assert_eq!(*flushes.borrow(), 0);
}

#[test]
fn tap_identifies_intermediate_results() {
    let mono = shared(Mono::new());
    let tap: Rc<RefCell<Tap<RealFrame>>> = shared(Tap::with_id("mixed"));
    mono.borrow_mut().connect_to(tap);

    let mut pump = Pump::new();
    pump.set_signal_source(Box::new(BufferSource::new(vec![RealFrame::new(
        0,
        vec![10.0, 20.0, 10.0, 20.0],
        AudioFormat::stereo(1000.0),
    )])));
    pump.add(mono);
    let results = pump.pump().unwrap();
    assert_eq!(results["mixed"].as_real().unwrap().real(), &[15.0, 15.0]);
}
