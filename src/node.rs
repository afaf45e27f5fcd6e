//! Type-erased graph surface.
//!
//! Processors are generic over their input and output frame types, but
//! the pump, the pipeline and the description tree need to treat nodes
//! uniformly. `GraphNode` is that erased surface: identity, structural
//! equality, child iteration and output harvesting over the closed
//! [`Value`] enum of carrier kinds.

use crate::bands::{MelSpectrum, MultiBandSpectrum};
use crate::frame::{ComplexFrame, RealFrame};
use crate::logfreq::LogFrequencySpectrum;
use crate::matrix::AudioMatrix;
use crate::spectrum::{InstantaneousFrequencySpectrum, LinearFrequencySpectrum};
use std::any::Any;

/// A harvested output: one of the crate's frame carriers.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Real(RealFrame),
    Complex(ComplexFrame),
    Linear(LinearFrequencySpectrum),
    Log(LogFrequencySpectrum),
    Instant(InstantaneousFrequencySpectrum),
    MultiBand(MultiBandSpectrum),
    Mel(MelSpectrum),
    Matrix(AudioMatrix),
}

macro_rules! value_from {
    ($variant:ident, $carrier:ty, $accessor:ident) => {
        impl From<$carrier> for Value {
            fn from(frame: $carrier) -> Self {
                Value::$variant(frame)
            }
        }

        impl Value {
            /// The contained carrier, if this value holds one.
            pub fn $accessor(&self) -> Option<&$carrier> {
                match self {
                    Value::$variant(frame) => Some(frame),
                    _ => None,
                }
            }
        }
    };
}

value_from!(Real, RealFrame, as_real);
value_from!(Complex, ComplexFrame, as_complex);
value_from!(Linear, LinearFrequencySpectrum, as_linear);
value_from!(Log, LogFrequencySpectrum, as_log);
value_from!(Instant, InstantaneousFrequencySpectrum, as_instant);
value_from!(MultiBand, MultiBandSpectrum, as_multi_band);
value_from!(Mel, MelSpectrum, as_mel);
value_from!(Matrix, AudioMatrix, as_matrix);

/// Erased node surface shared by every processor.
pub trait GraphNode {
    /// Opaque identity. Only identified nodes appear in pump results.
    fn id(&self) -> Option<&str>;

    /// Last emitted output, erased.
    fn output_value(&self) -> Option<Value>;

    fn as_any(&self) -> &dyn Any;

    /// Structural equality of this node alone: same concrete type, same
    /// parameters, same id. Children are not considered. Nodes wrapping
    /// closures never compare equal.
    fn shallow_equals(&self, other: &dyn GraphNode) -> bool;

    /// Adopt the children of a structurally equal node. Used by the
    /// pump to deduplicate shared graph prefixes.
    fn merge_from(&mut self, other: &dyn GraphNode);

    /// One-line textual representation (the `Display` output).
    fn describe(&self) -> String;

    /// Visit every distinct downstream node in connection order.
    fn for_each_child(&self, f: &mut dyn FnMut(&dyn GraphNode));
}

/// Address comparison of two erased node borrows.
pub(crate) fn same_node(a: &dyn GraphNode, b: &dyn GraphNode) -> bool {
    std::ptr::addr_eq(a as *const dyn GraphNode, b as *const dyn GraphNode)
}

/// Render the subtree rooted at `node` as an indented tree, one node
/// per line, two spaces per level.
pub fn describe_tree(node: &dyn GraphNode, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&node.describe());
    out.push('\n');
    node.for_each_child(&mut |child| describe_tree(child, depth + 1, out));
}

/// Implement [`GraphNode`] for a processor with the conventional
/// `id`/`out`/`last` fields. The listed extra fields participate in
/// structural equality alongside the id.
macro_rules! impl_node {
    (($($generics:tt)*) $ty:ty, [$($field:ident),*]) => {
        impl<$($generics)*> $crate::node::GraphNode for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }
            fn output_value(&self) -> Option<$crate::node::Value> {
                self.last.clone().map(Into::into)
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn shallow_equals(&self, other: &dyn $crate::node::GraphNode) -> bool {
                match other.as_any().downcast_ref::<Self>() {
                    Some(other) => self.id == other.id $(&& self.$field == other.$field)*,
                    None => false,
                }
            }
            fn merge_from(&mut self, other: &dyn $crate::node::GraphNode) {
                if let Some(other) = other.as_any().downcast_ref::<Self>() {
                    self.out.merge(&other.out);
                }
            }
            fn describe(&self) -> String {
                self.to_string()
            }
            fn for_each_child(&self, f: &mut dyn FnMut(&dyn $crate::node::GraphNode)) {
                self.out.for_each_child(f);
            }
        }
    };
    ($ty:ty, [$($field:ident),*]) => {
        $crate::node::impl_node!(() $ty, [$($field),*]);
    };
}

pub(crate) use impl_node;
