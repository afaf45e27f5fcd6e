//! The pump: drives a source through a set of root processors.

use crate::error::{Error, Result};
use crate::fanout::merge_into;
use crate::node::{describe_tree, GraphNode, Value};
use crate::processor::SharedSink;
use crate::source::Source;
use log::{debug, warn};
use std::collections::HashMap;

/// Owns one signal source and a set of root sinks, runs the push path
/// to completion and harvests identified outputs.
///
/// Before each run the pump computes the *effective* root set:
/// structurally equal nodes are merged recursively, so accidentally
/// duplicated graph prefixes execute once. On a source error the loop
/// aborts and the error propagates without flushing the roots; callers
/// that must release resources flush or close explicitly.
pub struct Pump<I> {
    source: Option<Box<dyn Source<Output = I>>>,
    roots: Vec<SharedSink<I>>,
}

impl<I> Default for Pump<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Pump<I> {
    pub fn new() -> Self {
        Self {
            source: None,
            roots: Vec::new(),
        }
    }

    pub fn set_signal_source(&mut self, source: Box<dyn Source<Output = I>>) {
        self.source = Some(source);
    }

    /// Add a root processor. Structural duplicates are merged when the
    /// pump runs, not here.
    pub fn add(&mut self, root: SharedSink<I>) {
        self.roots.push(root);
    }

    /// The deduplicated root set used by the next run.
    fn effective_roots(&self) -> Vec<SharedSink<I>> {
        let mut effective: Vec<SharedSink<I>> = Vec::new();
        for root in &self.roots {
            merge_into(&mut effective, root);
        }
        effective
    }

    /// Run the push loop: read every frame, forward it to every
    /// effective root, then flush each root exactly once. Returns the
    /// id-to-output map of every reachable identified node.
    pub fn pump(&mut self) -> Result<HashMap<String, Value>> {
        if self.source.is_none() {
            return Err(Error::NoSource);
        }
        let effective = self.effective_roots();
        debug!(
            "pumping {} effective roots ({} added)",
            effective.len(),
            self.roots.len()
        );
        let mut frames = 0u64;
        loop {
            let Some(source) = self.source.as_mut() else {
                return Err(Error::NoSource);
            };
            match source.read() {
                Ok(Some(frame)) => {
                    frames += 1;
                    for root in &effective {
                        root.borrow_mut().process(&frame)?;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("source failed after {frames} frames, aborting without flush");
                    return Err(error);
                }
            }
        }
        debug!("end of stream after {frames} frames, flushing");
        for root in &effective {
            root.borrow_mut().flush()?;
        }
        let mut results = HashMap::new();
        let mut visited: Vec<*const ()> = Vec::new();
        for root in &effective {
            harvest(&*root.borrow(), &mut visited, &mut results);
        }
        Ok(results)
    }

    /// Human-readable tree of the effective graph, one node per line.
    pub fn description(&self) -> String {
        let mut out = String::new();
        for root in self.effective_roots() {
            describe_tree(&*root.borrow(), 0, &mut out);
        }
        out
    }
}

fn harvest(
    node: &dyn GraphNode,
    visited: &mut Vec<*const ()>,
    results: &mut HashMap<String, Value>,
) {
    let address = node as *const dyn GraphNode as *const ();
    if visited.contains(&address) {
        return;
    }
    visited.push(address);
    if let Some(id) = node.id() {
        if let Some(value) = node.output_value() {
            results.insert(id.to_string(), value);
        }
    }
    node.for_each_child(&mut |child| harvest(child, visited, results));
}
