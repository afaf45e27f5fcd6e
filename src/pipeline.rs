//! Straight-chain pipeline adapter.

use crate::error::{parameter_error, Result};
use crate::node::{same_node, GraphNode, Value};
use crate::processor::{SharedSink, Sink};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Wraps a straight 1-in/1-out chain of processors as a single node.
///
/// Construction validates that the first node reaches the last through
/// exactly one child per interior node; a branch or a dead end is a
/// construction error. `process` and `flush` forward to the first node,
/// the pipeline's output and id are the last node's.
pub struct Pipeline<I> {
    id: Option<String>,
    first: SharedSink<I>,
    last: Rc<RefCell<dyn GraphNode>>,
}

impl<I> Pipeline<I> {
    pub fn new<P, Q>(first: Rc<RefCell<P>>, last: Rc<RefCell<Q>>) -> Result<Self>
    where
        P: Sink<Input = I> + 'static,
        Q: GraphNode + 'static,
    {
        let first: SharedSink<I> = first;
        let last: Rc<RefCell<dyn GraphNode>> = last;
        validate_line(&*first.borrow(), &*last.borrow())?;
        let id = last.borrow().id().map(str::to_string);
        Ok(Self { id, first, last })
    }

    /// Output of the last node in the chain.
    pub fn output(&self) -> Option<Value> {
        self.last.borrow().output_value()
    }

    /// Whether a node with the given id is part of the chain.
    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some() || self.first.borrow().id() == Some(id)
    }

    /// Output of the chain node carrying the given id.
    pub fn find(&self, id: &str) -> Option<Value> {
        let mut found = None;
        find_in(&*self.first.borrow(), id, &mut found);
        found
    }
}

fn find_in(node: &dyn GraphNode, id: &str, found: &mut Option<Value>) {
    if found.is_some() {
        return;
    }
    if node.id() == Some(id) {
        *found = node.output_value();
        return;
    }
    node.for_each_child(&mut |child| find_in(child, id, found));
}

/// Check that `node` reaches `last` through exactly one child per
/// interior node.
fn validate_line(node: &dyn GraphNode, last: &dyn GraphNode) -> Result<()> {
    if same_node(node, last) {
        return Ok(());
    }
    let mut children = 0;
    let mut tail: Result<()> = parameter_error("pipeline does not reach its last processor");
    node.for_each_child(&mut |child| {
        children += 1;
        if children == 1 {
            tail = validate_line(child, last);
        }
    });
    if children != 1 {
        return parameter_error(format!(
            "pipeline must be a straight line, found {} branches at {}",
            children,
            node.describe()
        ));
    }
    tail
}

impl<I> fmt::Display for Pipeline<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "Pipeline{{id={id}}}"),
            None => f.write_str("Pipeline"),
        }
    }
}

impl<I: 'static> GraphNode for Pipeline<I> {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn output_value(&self) -> Option<Value> {
        self.last.borrow().output_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shallow_equals(&self, _other: &dyn GraphNode) -> bool {
        // Pipelines wrap arbitrary chains and never merge.
        false
    }

    fn merge_from(&mut self, _other: &dyn GraphNode) {}

    fn describe(&self) -> String {
        self.to_string()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn GraphNode)) {
        f(&*self.first.borrow());
    }
}

impl<I: 'static> Sink for Pipeline<I> {
    type Input = I;

    fn process(&mut self, input: &I) -> Result<()> {
        self.first.borrow_mut().process(input)
    }

    fn process_channel(&mut self, channel: usize, input: &I) -> Result<()> {
        self.first.borrow_mut().process_channel(channel, input)
    }

    fn flush(&mut self) -> Result<()> {
        self.first.borrow_mut().flush()
    }
}
