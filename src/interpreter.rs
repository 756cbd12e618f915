//! The execution interpreter: walks a parsed [`Model`] in declared node
//! order, dispatching each node to its kernel and threading intermediate
//! tensors through a [`SymbolTable`].

use tracing::instrument;

use crate::error::{InferError, InferResult};
use crate::kernels;
use crate::model::{Graph, Model};
use crate::symtab::SymbolTable;
use crate::tensor::Tensor;

/// Runs `model` against `input`, returning the tensor registered under the
/// graph's output name once every node has executed.
#[instrument(skip_all)]
pub fn run(model: &Model, input: Tensor) -> InferResult<Tensor> {
    let graph = &model.graph;
    let mut symtab = SymbolTable::with_capacity(graph.nodes.len() + graph.initializers.len() + 1);

    let input_name = resolve_input_name(graph);
    symtab.register(input_name, input)?;

    for initializer in &graph.initializers {
        let name = initializer.name().to_string();
        symtab.register(name, initializer.clone())?;
    }

    for (node_index, node) in graph.nodes.iter().enumerate() {
        dispatch(node_index, node, &mut symtab)?;
    }

    let output_name = resolve_output_name(graph);
    symtab.into_tensor(&output_name)
}

fn resolve_input_name(graph: &Graph) -> String {
    if !graph.input_name.is_empty() {
        return graph.input_name.clone();
    }
    graph
        .nodes
        .first()
        .and_then(|n| n.inputs.first())
        .cloned()
        .unwrap_or_default()
}

fn resolve_output_name(graph: &Graph) -> String {
    if !graph.output_name.is_empty() {
        return graph.output_name.clone();
    }
    graph
        .nodes
        .last()
        .and_then(|n| n.outputs.first())
        .cloned()
        .unwrap_or_default()
}

#[instrument(skip(symtab), fields(op_type = %node.op_type, node_index))]
fn dispatch(node_index: usize, node: &crate::model::Node, symtab: &mut SymbolTable) -> InferResult<()> {
    let input_at = |symtab: &SymbolTable, i: usize| -> InferResult<Tensor> {
        let name = node.inputs.get(i).ok_or_else(|| InferError::ShapeError {
            node: node_index,
            expected: vec![i + 1],
            actual: vec![node.inputs.len()],
        })?;
        symtab.get(name).cloned()
    };

    let output_name = node.outputs.first().cloned().unwrap_or_default();

    let output = match node.op_type.as_str() {
        "Conv" => {
            let x = input_at(symtab, 0)?;
            let w = input_at(symtab, 1)?;
            let bias = if node.inputs.len() > 2 {
                Some(input_at(symtab, 2)?)
            } else {
                None
            };

            let mut strides = [1i64, 1];
            node.attr_ints("strides", &mut strides, 2)?;
            let mut dilations = [1i64, 1];
            node.attr_ints("dilations", &mut dilations, 2)?;
            let mut pads = [0i64; 4];
            node.attr_ints("pads", &mut pads, 4)?;
            if pads[0] != pads[2] || pads[1] != pads[3] {
                return Err(InferError::UnsupportedAttributeValue {
                    op_type: node.op_type.clone(),
                    attr: "pads".to_string(),
                    value: format!("{pads:?}"),
                });
            }
            let group = node.attr_int("group", 1)?;

            let data = kernels::conv2d(
                x.as_array(),
                w.as_array(),
                bias.as_ref().map(|b| b.as_slice()).transpose()?.as_deref(),
                (strides[0] as usize, strides[1] as usize),
                (pads[0] as usize, pads[1] as usize),
                (dilations[0] as usize, dilations[1] as usize),
                group,
            )
            .map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        "BatchNormalization" => {
            let x = input_at(symtab, 0)?;
            let scale = input_at(symtab, 1)?;
            let bias = input_at(symtab, 2)?;
            let mean = input_at(symtab, 3)?;
            let var = input_at(symtab, 4)?;
            let epsilon = node.attr_float("epsilon", 1e-5)?;

            let data = kernels::batch_normalization(
                x.as_array(),
                scale.as_slice()?,
                bias.as_slice()?,
                mean.as_slice()?,
                var.as_slice()?,
                epsilon,
            )
            .map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        "Relu" => {
            let x = input_at(symtab, 0)?;
            let data = kernels::relu(x.as_array());
            Tensor::new(output_name.clone(), data)
        }
        "Add" => {
            let a = input_at(symtab, 0)?;
            let b = input_at(symtab, 1)?;
            let data = kernels::add(a.as_array(), b.as_array()).map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        "MaxPool" => {
            let x = input_at(symtab, 0)?;
            let mut kernel_shape = [1i64, 1];
            node.attr_ints("kernel_shape", &mut kernel_shape, 2)?;
            let mut strides = [1i64, 1];
            node.attr_ints("strides", &mut strides, 2)?;
            let mut pads = [0i64; 4];
            node.attr_ints("pads", &mut pads, 4)?;
            if pads[0] != pads[2] || pads[1] != pads[3] {
                return Err(InferError::UnsupportedAttributeValue {
                    op_type: node.op_type.clone(),
                    attr: "pads".to_string(),
                    value: format!("{pads:?}"),
                });
            }

            let data = kernels::max_pool2d(
                x.as_array(),
                (kernel_shape[0] as usize, kernel_shape[1] as usize),
                (strides[0] as usize, strides[1] as usize),
                (pads[0] as usize, pads[1] as usize),
            )
            .map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        "GlobalAveragePool" => {
            let x = input_at(symtab, 0)?;
            let data = kernels::global_average_pool(x.as_array()).map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        "Flatten" => {
            let x = input_at(symtab, 0)?;
            let data = kernels::flatten(x.as_array());
            Tensor::new(output_name.clone(), data)
        }
        "Gemm" => {
            let a = input_at(symtab, 0)?;
            let b = input_at(symtab, 1)?;
            let c = if node.inputs.len() > 2 {
                Some(input_at(symtab, 2)?)
            } else {
                None
            };
            let alpha = node.attr_float("alpha", 1.0)?;
            let beta = node.attr_float("beta", 1.0)?;
            let trans_a = node.attr_int("transA", 0)? != 0;
            let trans_b = node.attr_int("transB", 0)? != 0;

            let data = kernels::gemm(
                a.as_array(),
                b.as_array(),
                c.as_ref().map(|c| c.as_slice()).transpose()?.as_deref(),
                alpha,
                beta,
                trans_a,
                trans_b,
            )
            .map_err(|e| attach_node(e, node_index))?;
            Tensor::new(output_name.clone(), data)
        }
        other => {
            return Err(InferError::UnsupportedOperator {
                op_type: other.to_string(),
                node_index,
            })
        }
    };

    symtab.register(output_name, output)
}

fn attach_node(err: InferError, node_index: usize) -> InferError {
    match err {
        InferError::ShapeError { expected, actual, .. } => InferError::ShapeError {
            node: node_index,
            expected,
            actual,
        },
        other => other,
    }
}
