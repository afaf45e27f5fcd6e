//! The processor abstraction: push and pull evaluation of graph nodes.
//!
//! A node consumes frames of its input type and emits frames of its
//! output type. In push mode a caller (usually the pump) invokes
//! `process` for every frame and `flush` at end-of-stream; outputs are
//! forwarded through the node's fan-out. In pull mode a caller invokes
//! `read` on the terminal node, which drives its single upstream
//! source.

use crate::error::Result;
use crate::fanout::Fanout;
use crate::node::{GraphNode, Value};
use crate::source::Source;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Push-mode consumer end of a node, erased over its output type.
///
/// Every processor is a `Sink` for its input type; fan-out lists hold
/// `SharedSink` handles. The graph is single-threaded, so shared
/// children are `Rc<RefCell<_>>`.
pub trait Sink: GraphNode {
    type Input;

    /// Consume one input. Nodes transform it into zero, one or many
    /// outputs and forward each through their fan-out. A non-emitting
    /// call leaves the cached output unchanged.
    fn process(&mut self, input: &Self::Input) -> Result<()>;

    /// Multi-channel push variant. The default treats channel 0 as a
    /// single-channel push and ignores every other channel; only nodes
    /// that declare themselves multi-channel override this.
    fn process_channel(&mut self, channel: usize, input: &Self::Input) -> Result<()> {
        if channel == 0 {
            self.process(input)
        } else {
            Ok(())
        }
    }

    /// Signal that no more inputs will arrive. Stateful nodes may emit
    /// final outputs here; the flush is then forwarded downstream
    /// exactly once.
    fn flush(&mut self) -> Result<()>;
}

/// Shared handle to a type-erased downstream.
pub type SharedSink<I> = Rc<RefCell<dyn Sink<Input = I>>>;

/// Full processor surface: a sink that also produces outputs.
pub trait Processor: Sink {
    type Output: Clone + Into<Value> + 'static;

    /// Last emitted output, if any.
    fn output(&self) -> Option<&Self::Output>;

    /// Pull one output. The node reads from its upstream source,
    /// transforms (consuming non-emitting inputs silently), caches the
    /// output and returns it; end-of-stream drains flush-time residue
    /// and then propagates as `None`.
    fn read(&mut self) -> Result<Option<Self::Output>>;

    /// Set the single upstream source for pull evaluation.
    fn set_source(&mut self, source: Box<dyn Source<Output = Self::Input>>);

    fn fanout(&self) -> &Fanout<Self::Output>;

    fn fanout_mut(&mut self) -> &mut Fanout<Self::Output>;

    /// Connect a downstream; returns the handle for chaining.
    fn connect_to(&mut self, sink: SharedSink<Self::Output>) -> SharedSink<Self::Output> {
        self.fanout_mut().add(sink.clone());
        sink
    }

    /// Connect a downstream listening to one channel.
    fn connect_to_channel(
        &mut self,
        channel: usize,
        sink: SharedSink<Self::Output>,
    ) -> SharedSink<Self::Output> {
        self.fanout_mut().add_channel(channel, sink.clone());
        sink
    }

    fn disconnect_from(&mut self, sink: &SharedSink<Self::Output>) {
        self.fanout_mut().remove(sink);
    }

    fn disconnect_from_channel(&mut self, channel: usize, sink: &SharedSink<Self::Output>) {
        self.fanout_mut().remove_channel(channel, sink);
    }
}

/// Wrap a processor in a shared handle.
pub fn shared<P>(processor: P) -> Rc<RefCell<P>> {
    Rc::new(RefCell::new(processor))
}

/// Pass-through probe that records its last input.
///
/// A `Tap` forwards every input unchanged and accepts pushes on any
/// channel, which makes it a convenient identified probe behind
/// splitters.
pub struct Tap<F> {
    id: Option<String>,
    out: Fanout<F>,
    last: Option<F>,
    source: Option<Box<dyn Source<Output = F>>>,
}

impl<F> Tap<F> {
    pub fn new() -> Self {
        Self {
            id: None,
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new()
        }
    }
}

impl<F> Default for Tap<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Display for Tap<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tap{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}")?;
        }
        write!(f, "}}")
    }
}

crate::node::impl_node!((F: Clone + Into<Value> + 'static) Tap<F>, []);

impl<F: Clone + Into<Value> + 'static> Sink for Tap<F> {
    type Input = F;

    fn process(&mut self, input: &F) -> Result<()> {
        self.out.process(input)?;
        self.last = Some(input.clone());
        Ok(())
    }

    fn process_channel(&mut self, _channel: usize, input: &F) -> Result<()> {
        self.process(input)
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl<F: Clone + Into<Value> + 'static> Processor for Tap<F> {
    type Output = F;

    fn output(&self) -> Option<&F> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<F>> {
        let source = self.source.as_mut().ok_or(crate::error::Error::NoSource)?;
        let frame = source.read()?;
        if let Some(frame) = &frame {
            self.last = Some(frame.clone());
        }
        Ok(frame)
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = F>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<F> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<F> {
        &mut self.out
    }
}
