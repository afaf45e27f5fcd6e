//! Graph runtime tests: fan-out bookkeeping, push/pull evaluation and
//! the framing processors.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use wavegraph::prelude::*;

/// Downstream probe recording every received frame and flush.
struct Probe {
    frames: Rc<RefCell<Vec<RealFrame>>>,
    flushes: Rc<RefCell<usize>>,
}

impl Probe {
    fn new() -> (Self, Rc<RefCell<Vec<RealFrame>>>, Rc<RefCell<usize>>) {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let flushes = Rc::new(RefCell::new(0));
        (
            Self {
                frames: frames.clone(),
                flushes: flushes.clone(),
            },
            frames,
            flushes,
        )
    }
}

impl GraphNode for Probe {
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
        "Probe".into()
    }
    fn for_each_child(&self, _f: &mut dyn FnMut(&dyn GraphNode)) {}
}

impl Sink for Probe {
    type Input = RealFrame;

    fn process(&mut self, input: &RealFrame) -> Result<()> {
        self.frames.borrow_mut().push(input.clone());
        Ok(())
    }

    fn process_channel(&mut self, _channel: usize, input: &RealFrame) -> Result<()> {
        self.process(input)
    }

    fn flush(&mut self) -> Result<()> {
        *self.flushes.borrow_mut() += 1;
        Ok(())
    }
}

fn mono_frame(index: u64, samples: Vec<f32>, sample_rate: f32) -> RealFrame {
    RealFrame::new(index, samples, AudioFormat::mono(sample_rate))
}

#[test]
fn connect_then_disconnect_empties_the_fanout() {
    let mut mono = Mono::new();
    let (first, _, _) = Probe::new();
    let (second, _, _) = Probe::new();
    let first = mono.connect_to(shared(first));
    let second = mono.connect_to(shared(second));

    // Insertion order is forwarding order.
    let connected = mono.fanout().connected();
    assert_eq!(connected.len(), 2);
    assert!(Rc::ptr_eq(&connected[0], &first));
    assert!(Rc::ptr_eq(&connected[1], &second));

    mono.disconnect_from(&first);
    mono.disconnect_from(&second);
    assert!(mono.fanout().connected().is_empty());
}

#[test]
fn downstream_sees_every_emission_and_one_flush() {
    let mut window = SlidingWindow::with_hop(4, 4).unwrap();
    let (probe, frames, flushes) = Probe::new();
    window.connect_to(shared(probe));
    window.process(&mono_frame(0, (0..10).map(|x| x as f32).collect(), 100.0)).unwrap();
    assert_eq!(frames.borrow().len(), 2);
    window.flush().unwrap();
    // The residue of two samples is drained as one padded slice.
    assert_eq!(frames.borrow().len(), 3);
    assert_eq!(*flushes.borrow(), 1);
    assert_eq!(frames.borrow()[2].real(), &[8.0, 9.0, 0.0, 0.0]);
}

#[test]
fn mono_averages_interleaved_pairs() {
    let mut mono = Mono::new();
    let stereo = RealFrame::new(
        0,
        vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0],
        AudioFormat::stereo(10000.0),
    );
    mono.process(&stereo).unwrap();
    let output = mono.output().unwrap();
    assert_eq!(output.real(), &[15.0, 15.0, 15.0]);
    assert_eq!(output.format().channels, 1);
    assert_eq!(output.format().sample_rate, 10000.0);
}

#[test]
fn downsample_by_two_mono() {
    let mut node = Downsample::new(2).unwrap();
    node.process(&mono_frame(100, vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0], 10000.0))
        .unwrap();
    let output = node.output().unwrap();
    assert_eq!(output.frame_index(), 50);
    assert_eq!(output.real(), &[1.0, 1.0, 1.0, 1.0]);
    assert_eq!(output.format().sample_rate, 5000.0);
}

#[test]
fn downsample_by_two_stereo_keeps_interleaving() {
    let mut node = Downsample::new(2).unwrap();
    let stereo = RealFrame::new(
        100,
        vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0],
        AudioFormat::stereo(10000.0),
    );
    node.process(&stereo).unwrap();
    let output = node.output().unwrap();
    assert_eq!(output.frame_index(), 50);
    assert_eq!(output.real(), &[1.0, 2.0, 1.0, 2.0]);
    assert_eq!(output.format().sample_rate, 5000.0);
    assert_eq!(output.format().channels, 2);
}

#[test]
fn downsample_display_and_construction() {
    assert_eq!(
        Downsample::new(2).unwrap().to_string(),
        "Downsample{nthFrameToKeep=2}"
    );
    assert!(Downsample::new(0).is_err());
}

#[test]
fn resample_display_and_behaviour() {
    assert_eq!(Resample::new(1, 2).unwrap().to_string(), "Resample{factor=1/2}");
    assert_eq!(Resample::new(3, 1).unwrap().to_string(), "Resample{factor=3}");
    assert!(Resample::new(0, 2).is_err());
    assert!(Resample::new(3, 2).is_err());

    let mut down = Resample::new(1, 2).unwrap();
    down.process(&mono_frame(100, vec![1.0, 3.0, 5.0, 7.0], 8000.0))
        .unwrap();
    let output = down.output().unwrap();
    assert_eq!(output.real(), &[2.0, 6.0]);
    assert_eq!(output.format().sample_rate, 4000.0);
    assert_eq!(output.frame_index(), 50);

    let mut up = Resample::new(2, 1).unwrap();
    up.process(&mono_frame(100, vec![1.0, 2.0], 8000.0)).unwrap();
    let output = up.output().unwrap();
    assert_eq!(output.real(), &[1.0, 1.0, 2.0, 2.0]);
    assert_eq!(output.format().sample_rate, 16000.0);
    assert_eq!(output.frame_index(), 200);
}

#[test]
fn zeropad_display_and_split() {
    let node: Zeropad<RealFrame> = Zeropad::new(Position::Both, 10).with_id("Id");
    assert_eq!(node.to_string(), "Zeropad{id=Id, BOTH, sizeAfterPadding=10}");

    let mut node: Zeropad<RealFrame> = Zeropad::new(Position::Both, 10);
    node.process(&mono_frame(0, vec![1.0; 7], 100.0)).unwrap();
    let output = node.output().unwrap();
    assert_eq!(
        output.real(),
        &[0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
    );

    // Complex frames pad both parts.
    let mut node: Zeropad<ComplexFrame> = Zeropad::new(Position::Back, 4);
    node.process(&ComplexFrame::new(
        0,
        vec![1.0, 2.0],
        vec![3.0, 4.0],
        AudioFormat::mono(100.0),
    ))
    .unwrap();
    let output = node.output().unwrap();
    assert_eq!(output.real(), &[1.0, 2.0, 0.0, 0.0]);
    assert_eq!(output.imaginary(), &[3.0, 4.0, 0.0, 0.0]);

    // A frame longer than the target is a format error.
    let mut node: Zeropad<RealFrame> = Zeropad::new(Position::Front, 2);
    assert!(node.process(&mono_frame(0, vec![1.0; 3], 100.0)).is_err());
}

#[test]
fn frame_number_filter_bounds() {
    assert_eq!(
        FrameNumberFilter::<RealFrame>::new(23, 41).unwrap().to_string(),
        "FrameNumberFilter{minFrameNumber=23, maxFrameNumber=41}"
    );
    assert!(FrameNumberFilter::<RealFrame>::new(41, 23).is_err());

    let mut filter = FrameNumberFilter::<RealFrame>::new(10, 20).unwrap();
    let (probe, frames, _) = Probe::new();
    filter.connect_to(shared(probe));
    for index in [0u64, 10, 15, 20, 21] {
        filter.process(&mono_frame(index, vec![1.0], 100.0)).unwrap();
    }
    let received: Vec<u64> = frames.borrow().iter().map(|f| f.frame_index()).collect();
    assert_eq!(received, vec![10, 15, 20]);
}

#[test]
fn sliding_window_over_a_ramp() {
    let mut window = SlidingWindow::with_hop(6, 2).unwrap();
    let (probe, frames, flushes) = Probe::new();
    window.connect_to(shared(probe));

    // 0..=127 fed as eight 16-sample frames.
    for chunk in 0..8u64 {
        let samples: Vec<f32> = (0..16).map(|i| (chunk * 16 + i) as f32).collect();
        window
            .process(&mono_frame(chunk * 16, samples, 1000.0))
            .unwrap();
    }
    window.flush().unwrap();

    let frames = frames.borrow();
    // One slice per hop position.
    assert_eq!(frames.len(), 64);
    for (k, slice) in frames.iter().enumerate() {
        assert_eq!(slice.len(), 6);
        assert_eq!(slice.frame_index(), k as u64 * 2);
        assert_eq!(slice.real()[0], k as f32 * 2.0);
    }
    // The trailing slice holds the last samples, zero-padded.
    assert_eq!(frames[62].real(), &[124.0, 125.0, 126.0, 127.0, 0.0, 0.0]);
    assert_eq!(frames[63].real(), &[126.0, 127.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(*flushes.borrow(), 1);
}

#[test]
fn sliding_window_gapped_hop_skips_samples() {
    let mut window = SlidingWindow::with_hop(2, 4).unwrap();
    let (probe, frames, _) = Probe::new();
    window.connect_to(shared(probe));
    window
        .process(&mono_frame(0, (0..12).map(|x| x as f32).collect(), 100.0))
        .unwrap();
    let frames = frames.borrow();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].real(), &[0.0, 1.0]);
    assert_eq!(frames[1].real(), &[4.0, 5.0]);
    assert_eq!(frames[2].real(), &[8.0, 9.0]);
}

#[test]
fn overlap_add_reconstruction() {
    let mut ola = OverlapAdd::new(6, 2).unwrap();
    let (probe, frames, _) = Probe::new();
    ola.connect_to(shared(probe));

    for i in 0..4u64 {
        ola.process(&mono_frame(i * 4, vec![1.0; 4], 100.0)).unwrap();
    }
    assert_eq!(frames.borrow().len(), 1);
    assert_eq!(frames.borrow()[0].real(), &[1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);

    ola.flush().unwrap();
    let frames = frames.borrow();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].real(), &[2.0, 2.0, 1.0, 1.0, 0.0, 0.0]);

    // Sum preservation: 16 ones in, 16 in total out.
    let total: f32 = frames.iter().flat_map(|f| f.real()).sum();
    assert_eq!(total, 16.0);
}

#[test]
fn interleaved_split_then_join_is_the_identity() {
    let mut split = InterleavedChannelSplit::new();
    let join = shared(InterleavedChannelJoin::new(2).unwrap());
    let (probe, frames, _) = Probe::new();
    join.borrow_mut().connect_to(shared(probe));
    split.connect_to_channel(0, join.clone());
    split.connect_to_channel(1, join.clone());

    let original = RealFrame::new(
        8,
        vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0],
        AudioFormat::stereo(1000.0),
    );
    split.process(&original).unwrap();
    split.flush().unwrap();

    assert_eq!(frames.borrow().len(), 1);
    assert_eq!(frames.borrow()[0], original);
}

#[test]
fn split_emits_deinterleaved_channels() {
    let mut split = InterleavedChannelSplit::new();
    let (left, left_frames, _) = Probe::new();
    let (right, right_frames, _) = Probe::new();
    split.connect_to_channel(0, shared(left));
    split.connect_to_channel(1, shared(right));

    split
        .process(&RealFrame::new(
            0,
            vec![1.0, 10.0, 2.0, 20.0],
            AudioFormat::stereo(1000.0),
        ))
        .unwrap();
    assert_eq!(left_frames.borrow()[0].real(), &[1.0, 2.0]);
    assert_eq!(right_frames.borrow()[0].real(), &[10.0, 20.0]);
    assert_eq!(left_frames.borrow()[0].format().channels, 1);
}

#[test]
fn unkeyed_downstream_behind_a_splitter_receives_channel_zero() {
    let mut split = InterleavedChannelSplit::new();
    let (probe, frames, _) = Probe::new();
    split.connect_to(shared(probe));
    split
        .process(&RealFrame::new(
            0,
            vec![1.0, 10.0, 2.0, 20.0],
            AudioFormat::stereo(1000.0),
        ))
        .unwrap();
    // Only channel 0 falls through to the unkeyed list.
    assert_eq!(frames.borrow().len(), 1);
    assert_eq!(frames.borrow()[0].real(), &[1.0, 2.0]);
}

#[test]
fn channel_selector_extracts_one_channel() {
    let mut selector = ChannelSelector::new(1);
    assert_eq!(selector.to_string(), "ChannelSelector{channel=1}");
    selector
        .process(&RealFrame::new(
            0,
            vec![1.0, 10.0, 2.0, 20.0],
            AudioFormat::stereo(1000.0),
        ))
        .unwrap();
    assert_eq!(selector.output().unwrap().real(), &[10.0, 20.0]);

    // Out-of-range channels are format errors.
    let mut bad = ChannelSelector::new(5);
    assert!(bad
        .process(&RealFrame::new(0, vec![1.0, 2.0], AudioFormat::stereo(1000.0)))
        .is_err());
}

#[test]
fn interleaved_join_display() {
    assert_eq!(
        InterleavedChannelJoin::new(2).unwrap().to_string(),
        "InterleavedChannelJoin{parts=2}"
    );
    assert!(InterleavedChannelJoin::new(0).is_err());
}

#[test]
fn pull_chain_through_processors() {
    // BufferSource -> Mono -> SlidingWindow, evaluated by pulling.
    let frames: Vec<RealFrame> = (0..4)
        .map(|i| {
            RealFrame::new(
                i * 4,
                vec![i as f32, i as f32, i as f32 + 1.0, i as f32 + 1.0],
                AudioFormat::stereo(1000.0),
            )
        })
        .collect();
    let mono = shared(Mono::new());
    mono.borrow_mut()
        .set_source(Box::new(BufferSource::new(frames)));
    let mut window = SlidingWindow::with_hop(3, 3).unwrap();
    window.set_source(Box::new(mono));

    let mut slices = Vec::new();
    while let Some(slice) = window.read().unwrap() {
        slices.push(slice);
    }
    // Eight mono samples drain into two full slices plus padded residue.
    assert_eq!(slices.len(), 3);
    assert_eq!(slices[0].real(), &[0.0, 1.0, 1.0]);
    assert_eq!(slices[1].real(), &[2.0, 2.0, 3.0]);
    assert_eq!(slices[2].real(), &[3.0, 4.0, 0.0]);
}

#[test]
fn window_mapping_scales_by_the_window() {
    let mut hamming = wavegraph::window::mapping(WindowFunction::Hamming);
    hamming.process(&mono_frame(0, vec![1.0; 11], 100.0)).unwrap();
    let output = hamming.output().unwrap();
    assert!((output.real()[0] - 0.08).abs() < 1e-6);
    assert!((output.real()[5] - 1.0).abs() < 1e-6);
}

#[test]
fn timestamp_limited_source_stops_the_stream() {
    let frames: Vec<RealFrame> = (0..10)
        .map(|i| mono_frame(i * 1000, vec![0.0; 4], 1000.0))
        .collect();
    let mut source = TimestampLimited::new(BufferSource::new(frames), 3, TimeUnit::Seconds);
    let mut seen = 0;
    while let Some(_frame) = source.read().unwrap() {
        seen += 1;
    }
    assert_eq!(seen, 3);
}
