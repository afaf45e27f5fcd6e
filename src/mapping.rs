//! Stateless 1:1 mapping node built from a closure.

use crate::error::Result;
use crate::fanout::Fanout;
use crate::node::{GraphNode, Value};
use crate::processor::{Processor, Sink};
use crate::source::Source;
use std::any::Any;
use std::fmt;

/// Applies a function to every input and forwards the result.
///
/// Two mappings are never structurally equal: the wrapped function has
/// no usable notion of equality, so the pump keeps distinct mapping
/// nodes distinct even when they were built from the same factory.
pub struct Mapping<I, O> {
    id: Option<String>,
    label: Option<String>,
    map: Box<dyn FnMut(&I) -> Result<O>>,
    out: Fanout<O>,
    last: Option<O>,
    source: Option<Box<dyn Source<Output = I>>>,
}

impl<I, O> Mapping<I, O> {
    pub fn new(map: impl FnMut(&I) -> Result<O> + 'static) -> Self {
        Self {
            id: None,
            label: None,
            map: Box::new(map),
            out: Fanout::new(),
            last: None,
            source: None,
        }
    }

    /// A mapping with a function label used in descriptions.
    pub fn labeled(
        label: impl Into<String>,
        map: impl FnMut(&I) -> Result<O> + 'static,
    ) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(map)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl<I, O> fmt::Display for Mapping<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapping{{")?;
        if let Some(id) = &self.id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "function={}}}",
            self.label.as_deref().unwrap_or("fn")
        )
    }
}

impl<I: 'static, O: Clone + Into<Value> + 'static> GraphNode for Mapping<I, O> {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn output_value(&self) -> Option<Value> {
        self.last.clone().map(Into::into)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shallow_equals(&self, _other: &dyn GraphNode) -> bool {
        // Closures cannot be compared.
        false
    }

    fn merge_from(&mut self, _other: &dyn GraphNode) {}

    fn describe(&self) -> String {
        self.to_string()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn GraphNode)) {
        self.out.for_each_child(f);
    }
}

impl<I: 'static, O: Clone + Into<Value> + 'static> Sink for Mapping<I, O> {
    type Input = I;

    fn process(&mut self, input: &I) -> Result<()> {
        let output = (self.map)(input)?;
        self.out.process(&output)?;
        self.last = Some(output);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

impl<I: 'static, O: Clone + Into<Value> + 'static> Processor for Mapping<I, O> {
    type Output = O;

    fn output(&self) -> Option<&O> {
        self.last.as_ref()
    }

    fn read(&mut self) -> Result<Option<O>> {
        let source = self.source.as_mut().ok_or(crate::error::Error::NoSource)?;
        match source.read()? {
            Some(input) => {
                let output = (self.map)(&input)?;
                self.last = Some(output.clone());
                Ok(Some(output))
            }
            None => Ok(None),
        }
    }

    fn set_source(&mut self, source: Box<dyn Source<Output = I>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &Fanout<O> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut Fanout<O> {
        &mut self.out
    }
}
