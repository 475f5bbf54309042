//! Computation graph of layers.
//!
//! A [`Model`] is a tree rooted at a single input node. Every node other than
//! the root is created under an existing producer, so the graph is acyclic by
//! construction. Interior nodes hold a [`Layer`]; output nodes are terminal and
//! bind a result slot.
//!
//! ```
//! use ff_nn::{Activation, Dense, Flatten, Layer, Model};
//! use ff_tensor::Tensor;
//!
//! let dense = Dense::new(&Tensor::full([4, 3], 0.1f32), &Tensor::zeros([3])).unwrap();
//! let layers: Vec<Layer<f32>> = vec![Flatten.into(), dense.into(), Activation::softmax(-1).into()];
//!
//! let mut model = Model::new(1);
//! let last = model.add_layers(layers, None).unwrap();
//! model.set_output(last, 0).unwrap();
//!
//! let outputs = model.predict(&Tensor::full([2, 2, 2], 1.0)).unwrap();
//! assert_eq!(outputs[0].dims(), &[2, 3]);
//! ```

use std::fmt;

use ff_backend_cpu::DenseScalar;
use ff_tensor::prelude::*;
use ff_tensor::Result;

use crate::layers::Layer;

/// Handle to a node inside one [`Model`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its model's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
enum NodeKind<T: DenseScalar> {
    Input,
    Layer(Layer<T>),
    Output { slot: usize },
}

#[derive(Clone, Debug)]
struct Node<T: DenseScalar> {
    kind: NodeKind<T>,
    producer: Option<NodeId>,
    consumers: Vec<NodeId>,
}

/// A tree of layers with one input and a fixed number of output slots.
///
/// `predict` only reads the structure and keeps its captures in a buffer local
/// to the call, so one model can serve concurrent predictions.
#[derive(Clone, Debug)]
pub struct Model<T: DenseScalar> {
    nodes: Vec<Node<T>>,
    outputs: Vec<Option<NodeId>>,
}

impl<T: DenseScalar> Model<T> {
    const ROOT: NodeId = NodeId(0);

    /// Create an empty model declaring `outputs` result slots.
    pub fn new(outputs: usize) -> Self {
        Model {
            nodes: vec![Node {
                kind: NodeKind::Input,
                producer: None,
                consumers: Vec::new(),
            }],
            outputs: vec![None; outputs],
        }
    }

    /// The root node receiving the tensor passed to [`Model::predict`].
    pub fn input(&self) -> NodeId {
        Self::ROOT
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Number of nodes, including the root and output nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Result<&Node<T>> {
        self.nodes
            .get(id.0)
            .ok_or(Error::UnknownNode { node: id.0 })
    }

    fn attach(&mut self, kind: NodeKind<T>, producer: NodeId) -> Result<NodeId> {
        self.node(producer)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            producer: Some(producer),
            consumers: Vec::new(),
        });
        self.nodes[producer.0].consumers.push(id);
        Ok(id)
    }

    /// Append `layer` under `producer` (the root when `None`) and return the
    /// new node.
    pub fn add_layer(
        &mut self,
        layer: impl Into<Layer<T>>,
        producer: Option<NodeId>,
    ) -> Result<NodeId> {
        let layer = layer.into();
        let producer = producer.unwrap_or(Self::ROOT);
        let description = layer.to_string();
        let id = self.attach(NodeKind::Layer(layer), producer)?;
        tracing::debug!(node = %id, producer = %producer, layer = %description, "added layer");
        Ok(id)
    }

    /// Append `layers` as a chain under `producer` and return the last node.
    /// An empty chain returns `producer` itself.
    pub fn add_layers<I, L>(&mut self, layers: I, producer: Option<NodeId>) -> Result<NodeId>
    where
        I: IntoIterator<Item = L>,
        L: Into<Layer<T>>,
    {
        let mut last = producer.unwrap_or(Self::ROOT);
        self.node(last)?;
        for layer in layers {
            last = self.add_layer(layer, Some(last))?;
        }
        Ok(last)
    }

    /// Bind output slot `index` to the result of `producer`.
    ///
    /// Binding a slot again detaches the previously bound output node, so
    /// each slot has exactly one live source.
    pub fn set_output(&mut self, producer: NodeId, index: usize) -> Result<()> {
        if index >= self.outputs.len() {
            return Err(Error::OutputIndexOutOfRange {
                index,
                outputs: self.outputs.len(),
            });
        }
        self.node(producer)?;

        if let Some(previous) = self.outputs[index].take() {
            if let Some(old_producer) = self.nodes[previous.0].producer.take() {
                self.nodes[old_producer.0]
                    .consumers
                    .retain(|&consumer| consumer != previous);
            }
            tracing::debug!(slot = index, node = %previous, "detached previous output");
        }

        let id = self.attach(NodeKind::Output { slot: index }, producer)?;
        self.outputs[index] = Some(id);
        tracing::debug!(slot = index, node = %id, producer = %producer, "bound output");
        Ok(())
    }

    /// The layer held by `id`, if it is an interior node.
    pub fn layer(&self, id: NodeId) -> Option<&Layer<T>> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    /// Consumers of `id` in the order they were attached.
    pub fn consumers(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.consumers)
    }

    /// Producer of `id`; `None` for the root and for detached output nodes.
    pub fn producer(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.producer)
    }

    /// Output slot bound by `id`, if it is an output node.
    pub fn output_slot(&self, id: NodeId) -> Option<usize> {
        match self.nodes.get(id.0)?.kind {
            NodeKind::Output { slot } => Some(slot),
            _ => None,
        }
    }

    /// Run `input` through the graph and return one tensor per output slot.
    ///
    /// Nodes are visited depth-first, consumers in attachment order; a node
    /// with several consumers hands each the same result. An output bound
    /// directly to the root returns a view sharing `input`'s storage.
    pub fn predict(&self, input: &Tensor<T>) -> Result<Vec<Tensor<T>>> {
        let _span = tracing::debug_span!(
            "predict",
            nodes = self.nodes.len(),
            outputs = self.outputs.len()
        )
        .entered();

        let mut captured: Vec<Option<Tensor<T>>> = vec![None; self.outputs.len()];
        let mut pending: Vec<(NodeId, Tensor<T>)> = Vec::new();
        push_consumers(&mut pending, &self.nodes[Self::ROOT.0].consumers, input);

        while let Some((id, received)) = pending.pop() {
            let node = &self.nodes[id.0];
            match &node.kind {
                NodeKind::Layer(layer) => {
                    let output = layer.apply(&received)?;
                    tracing::trace!(
                        node = %id,
                        layer = layer.name(),
                        input = %received.shape(),
                        output = %output.shape(),
                        "applied layer"
                    );
                    push_consumers(&mut pending, &node.consumers, &output);
                }
                NodeKind::Output { slot } => {
                    tracing::trace!(node = %id, slot, shape = %received.shape(), "captured output");
                    captured[*slot] = Some(received);
                }
                NodeKind::Input => {}
            }
        }

        captured
            .into_iter()
            .enumerate()
            .map(|(index, tensor)| tensor.ok_or(Error::OutputNotSet { index }))
            .collect()
    }
}

/// Push in reverse so the first consumer is popped first.
fn push_consumers<T: Scalar>(
    pending: &mut Vec<(NodeId, Tensor<T>)>,
    consumers: &[NodeId],
    tensor: &Tensor<T>,
) {
    pending.extend(consumers.iter().rev().map(|&c| (c, tensor.clone())));
}

impl<T: DenseScalar> fmt::Display for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model ({} outputs)", self.outputs.len())?;
        let mut stack = vec![(Self::ROOT, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            write!(f, "{:indent$}{id} ", "", indent = depth * 2)?;
            match &node.kind {
                NodeKind::Input => writeln!(f, "input")?,
                NodeKind::Layer(layer) => writeln!(f, "{layer}")?,
                NodeKind::Output { slot } => writeln!(f, "output[{slot}]")?,
            }
            stack.extend(node.consumers.iter().rev().map(|&c| (c, depth + 1)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Dense, Flatten};

    fn identity_dense(units: usize) -> Dense<f64> {
        let mut kernel = Tensor::zeros([units, units]);
        for i in 0..units {
            kernel.set(&[i, i], 1.0).unwrap();
        }
        Dense::new(&kernel, &Tensor::zeros([units])).unwrap()
    }

    #[test]
    fn test_empty_model_structure() {
        let model = Model::<f32>::new(2);
        assert_eq!(model.input().index(), 0);
        assert_eq!(model.node_count(), 1);
        assert_eq!(model.output_count(), 2);
        assert!(model.consumers(model.input()).unwrap().is_empty());
        assert_eq!(model.producer(model.input()).unwrap(), None);
    }

    #[test]
    fn test_add_layer_links_nodes() {
        let mut model = Model::<f64>::new(1);
        let a = model.add_layer(Flatten, None).unwrap();
        let b = model.add_layer(Activation::Tanh, Some(a)).unwrap();
        let c = model.add_layer(Activation::Sigmoid, Some(a)).unwrap();

        assert_eq!(model.consumers(model.input()).unwrap(), &[a]);
        assert_eq!(model.consumers(a).unwrap(), &[b, c]);
        assert_eq!(model.producer(c).unwrap(), Some(a));
        assert_eq!(model.layer(b).unwrap().name(), "tanh");
        assert!(model.layer(model.input()).is_none());
    }

    #[test]
    fn test_add_layers_chain() {
        let mut model = Model::<f64>::new(1);
        let first = model.add_layer(Flatten, None).unwrap();
        let last = model
            .add_layers(
                vec![Layer::from(identity_dense(2)), Activation::relu().into()],
                Some(first),
            )
            .unwrap();
        assert_eq!(model.node_count(), 4);
        assert_eq!(model.layer(last).unwrap().name(), "relu");

        let same = model.add_layers(Vec::<Layer<f64>>::new(), Some(last)).unwrap();
        assert_eq!(same, last);
    }

    #[test]
    fn test_unknown_node() {
        let mut model = Model::<f64>::new(1);
        let foreign = NodeId(7);
        assert_eq!(
            model.add_layer(Flatten, Some(foreign)).unwrap_err(),
            Error::UnknownNode { node: 7 }
        );
        assert_eq!(
            model.set_output(foreign, 0).unwrap_err(),
            Error::UnknownNode { node: 7 }
        );
        assert!(model.consumers(foreign).is_err());
        assert_eq!(model.node_count(), 1);
    }

    #[test]
    fn test_output_index_out_of_range() {
        let mut model = Model::<f64>::new(1);
        assert_eq!(
            model.set_output(model.input(), 1).unwrap_err(),
            Error::OutputIndexOutOfRange { index: 1, outputs: 1 }
        );
    }

    #[test]
    fn test_output_not_set() {
        let mut model = Model::<f64>::new(2);
        model.set_output(model.input(), 0).unwrap();
        assert_eq!(
            model.predict(&Tensor::zeros([1])).unwrap_err(),
            Error::OutputNotSet { index: 1 }
        );
    }

    #[test]
    fn test_output_on_root_shares_input() {
        let mut model = Model::<f64>::new(1);
        model.set_output(model.input(), 0).unwrap();
        let x = Tensor::full([2, 2], 3.0);
        let out = model.predict(&x).unwrap();
        assert!(out[0].shares_storage(&x));
    }

    #[test]
    fn test_rebinding_output_detaches_previous() {
        let mut model = Model::<f64>::new(1);
        let tanh = model.add_layer(Activation::Tanh, None).unwrap();
        let exp = model.add_layer(Activation::Exponential, None).unwrap();

        model.set_output(tanh, 0).unwrap();
        let stale = model.consumers(tanh).unwrap()[0];
        assert_eq!(model.output_slot(stale), Some(0));

        model.set_output(exp, 0).unwrap();
        assert!(model.consumers(tanh).unwrap().is_empty());
        assert_eq!(model.producer(stale).unwrap(), None);

        let out = model.predict(&Tensor::from_vec(vec![0.0], [1]).unwrap()).unwrap();
        assert_eq!(out[0].as_slice(), &[1.0]);
    }

    #[test]
    fn test_layer_error_aborts_predict() {
        let mut model = Model::<f64>::new(1);
        let dense = model.add_layer(identity_dense(3), None).unwrap();
        model.set_output(dense, 0).unwrap();
        assert_eq!(
            model.predict(&Tensor::zeros([2])).unwrap_err(),
            Error::shape("dense input", &[3], &[2])
        );
    }

    #[test]
    fn test_display_tree() {
        let mut model = Model::<f64>::new(2);
        let flat = model.add_layer(Flatten, None).unwrap();
        let soft = model.add_layer(Activation::softmax(-1), Some(flat)).unwrap();
        model.set_output(soft, 0).unwrap();
        model.set_output(flat, 1).unwrap();

        let text = model.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Model (2 outputs)",
                "#0 input",
                "  #1 flatten",
                "    #2 softmax(axis=-1)",
                "      #3 output[0]",
                "    #4 output[1]",
            ]
        );
    }

    #[test]
    fn test_model_is_send_and_sync() {
        fn assert_send_sync<M: Send + Sync>() {}
        assert_send_sync::<Model<f32>>();
        assert_send_sync::<Model<i64>>();
    }
}
