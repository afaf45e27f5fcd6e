//! Fan-out bookkeeping shared by all processors.
//!
//! A fan-out holds the downstream ends of a node's outgoing edges: an
//! ordered unkeyed list plus a sparse map of channel-keyed lists.
//! Insertion order is forwarding order.

use crate::error::Result;
use crate::node::GraphNode;
use crate::processor::SharedSink;
use std::collections::BTreeMap;
use std::rc::Rc;

pub struct Fanout<O> {
    list: Vec<SharedSink<O>>,
    channels: BTreeMap<usize, Vec<SharedSink<O>>>,
}

impl<O> Default for Fanout<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Fanout<O> {
    pub fn new() -> Self {
        Self {
            list: Vec::new(),
            channels: BTreeMap::new(),
        }
    }

    /// Connect a downstream at the end of the unkeyed list.
    pub fn add(&mut self, sink: SharedSink<O>) {
        self.list.push(sink);
    }

    /// Connect a downstream listening to one channel.
    pub fn add_channel(&mut self, channel: usize, sink: SharedSink<O>) {
        self.channels.entry(channel).or_default().push(sink);
    }

    /// Disconnect a downstream from the unkeyed list.
    pub fn remove(&mut self, sink: &SharedSink<O>) {
        self.list.retain(|existing| !Rc::ptr_eq(existing, sink));
    }

    /// Disconnect a downstream from one channel.
    pub fn remove_channel(&mut self, channel: usize, sink: &SharedSink<O>) {
        if let Some(sinks) = self.channels.get_mut(&channel) {
            sinks.retain(|existing| !Rc::ptr_eq(existing, sink));
            if sinks.is_empty() {
                self.channels.remove(&channel);
            }
        }
    }

    /// Snapshot of the unkeyed list in connection order.
    pub fn connected(&self) -> Vec<SharedSink<O>> {
        self.list.clone()
    }

    /// Snapshot of one channel's list in connection order.
    pub fn connected_channel(&self, channel: usize) -> Vec<SharedSink<O>> {
        self.channels.get(&channel).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.channels.is_empty()
    }

    /// Forward one output to every unkeyed downstream. The first error
    /// aborts the forward and propagates.
    pub fn process(&self, output: &O) -> Result<()> {
        for sink in &self.list {
            sink.borrow_mut().process(output)?;
        }
        Ok(())
    }

    /// Forward one channel's output to the downstreams keyed on that
    /// channel. A call on channel 0 with no channel-keyed entries falls
    /// through to the unkeyed list, which keeps single-channel
    /// processors working behind a splitter.
    pub fn process_channel(&self, channel: usize, output: &O) -> Result<()> {
        match self.channels.get(&channel) {
            Some(sinks) => {
                for sink in sinks {
                    sink.borrow_mut().process_channel(channel, output)?;
                }
                Ok(())
            }
            None if channel == 0 && self.channels.is_empty() => self.process(output),
            None => Ok(()),
        }
    }

    /// Forward a flush to every distinct downstream exactly once, in
    /// connection order (unkeyed first, then channels in ascending
    /// order).
    pub fn flush(&self) -> Result<()> {
        let mut seen: Vec<*const ()> = Vec::new();
        for sink in self.iter_all() {
            let address = Rc::as_ptr(sink) as *const ();
            if seen.contains(&address) {
                continue;
            }
            seen.push(address);
            sink.borrow_mut().flush()?;
        }
        Ok(())
    }

    /// Visit every distinct downstream as an erased node.
    pub(crate) fn for_each_child(&self, f: &mut dyn FnMut(&dyn GraphNode)) {
        let mut seen: Vec<*const ()> = Vec::new();
        for sink in self.iter_all() {
            let address = Rc::as_ptr(sink) as *const ();
            if seen.contains(&address) {
                continue;
            }
            seen.push(address);
            f(&*sink.borrow());
        }
    }

    /// Adopt the downstreams of another fan-out: a candidate that is
    /// structurally equal to an existing downstream is merged into it
    /// recursively, anything else is connected.
    pub(crate) fn merge(&mut self, other: &Fanout<O>) {
        for candidate in &other.list {
            merge_into(&mut self.list, candidate);
        }
        for (channel, sinks) in &other.channels {
            let list = self.channels.entry(*channel).or_default();
            for candidate in sinks {
                merge_into(list, candidate);
            }
        }
    }

    fn iter_all(&self) -> impl Iterator<Item = &SharedSink<O>> + '_ {
        self.list
            .iter()
            .chain(self.channels.values().flatten())
    }
}

/// Merge a candidate downstream into a list: structurally equal nodes
/// adopt the candidate's children, anything else is appended.
pub(crate) fn merge_into<O>(list: &mut Vec<SharedSink<O>>, candidate: &SharedSink<O>) {
    for existing in list.iter() {
        if Rc::ptr_eq(existing, candidate) {
            // The same node is already connected here.
            return;
        }
        let equal = existing.borrow().shallow_equals(&*candidate.borrow());
        if equal {
            existing.borrow_mut().merge_from(&*candidate.borrow());
            return;
        }
    }
    list.push(candidate.clone());
}
