use super::node::{Attribute, AttributeValue, Node};
use super::{dims_to_nchw, Graph, Model};
use crate::error::{InferError, InferResult};
use crate::tensor::Tensor;
use crate::wire::{read_packed_or_single_f32, read_packed_or_single_i64, Reader, WireType};

const MODEL_GRAPH: u32 = 7;

const GRAPH_NODE: u32 = 1;
const GRAPH_NAME: u32 = 2;
const GRAPH_INITIALIZER: u32 = 5;
const GRAPH_INPUT: u32 = 11;
const GRAPH_OUTPUT: u32 = 12;

const NODE_INPUT: u32 = 1;
const NODE_OUTPUT: u32 = 2;
const NODE_NAME: u32 = 3;
const NODE_OPTYPE: u32 = 4;
const NODE_ATTRIBUTE: u32 = 5;

const ATTR_NAME: u32 = 1;
const ATTR_INT: u32 = 2;
const ATTR_FLOAT: u32 = 4;
const ATTR_INTS: u32 = 7;
const ATTR_TYPE: u32 = 20;

const TENSOR_DIMS: u32 = 1;
const TENSOR_DATA_TYPE: u32 = 2;
const TENSOR_FLOAT_DATA: u32 = 4;
const TENSOR_NAME: u32 = 8;
const TENSOR_RAW_DATA: u32 = 9;

const VALUE_INFO_NAME: u32 = 1;

const ELEM_TYPE_FLOAT: i64 = 1;

fn read_string(reader: &mut Reader) -> InferResult<String> {
    let bytes = reader.read_length_delimited()?;
    String::from_utf8(bytes.to_vec()).map_err(|e| InferError::ParseError {
        offset: reader.pos(),
        what: format!("field is not valid utf-8: {e}"),
    })
}

/// Decodes a complete model file.
pub fn parse_model(data: &[u8]) -> InferResult<Model> {
    let mut reader = Reader::new(data);
    let mut graph = None;

    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        if field == MODEL_GRAPH && wire == WireType::LengthDelimited {
            let bytes = reader.read_length_delimited()?;
            graph = Some(parse_graph(&mut Reader::new(bytes))?);
        } else {
            reader.skip(wire)?;
        }
    }

    Ok(Model {
        graph: graph.unwrap_or_default(),
    })
}

fn parse_graph(reader: &mut Reader) -> InferResult<Graph> {
    let mut name = None;
    let mut nodes = Vec::new();
    let mut initializers = Vec::new();
    let mut input_name = None;
    let mut output_name = None;

    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        match field {
            GRAPH_NODE if wire == WireType::LengthDelimited => {
                let bytes = reader.read_length_delimited()?;
                nodes.push(parse_node(&mut Reader::new(bytes))?);
            }
            GRAPH_NAME if wire == WireType::LengthDelimited => {
                name = Some(read_string(reader)?);
            }
            GRAPH_INITIALIZER if wire == WireType::LengthDelimited => {
                let bytes = reader.read_length_delimited()?;
                initializers.push(parse_tensor(&mut Reader::new(bytes))?);
            }
            GRAPH_INPUT if wire == WireType::LengthDelimited => {
                let bytes = reader.read_length_delimited()?;
                if let Some(n) = parse_value_info_name(&mut Reader::new(bytes))? {
                    input_name.get_or_insert(n);
                }
            }
            GRAPH_OUTPUT if wire == WireType::LengthDelimited => {
                let bytes = reader.read_length_delimited()?;
                if let Some(n) = parse_value_info_name(&mut Reader::new(bytes))? {
                    output_name = Some(n);
                }
            }
            _ => reader.skip(wire)?,
        }
    }

    // Falls back to the first node's first input / last node's first
    // output when ValueInfo parsing found nothing — an inference from
    // convention, not a guarantee.
    let input_name = input_name
        .or_else(|| nodes.first().and_then(|n| n.inputs.first().cloned()))
        .unwrap_or_default();
    let output_name = output_name
        .or_else(|| nodes.last().and_then(|n| n.outputs.first().cloned()))
        .unwrap_or_default();

    Ok(Graph {
        name,
        nodes,
        initializers,
        input_name,
        output_name,
    })
}

/// ValueInfo is a length-delimited sub-message whose inner field 1 is the
/// name; everything else about it (declared type, shape hints) is skipped.
fn parse_value_info_name(reader: &mut Reader) -> InferResult<Option<String>> {
    let mut name = None;
    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        if field == VALUE_INFO_NAME && wire == WireType::LengthDelimited {
            name = Some(read_string(reader)?);
        } else {
            reader.skip(wire)?;
        }
    }
    Ok(name)
}

fn parse_node(reader: &mut Reader) -> InferResult<Node> {
    let mut node = Node::default();

    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        match field {
            NODE_INPUT if wire == WireType::LengthDelimited => {
                node.inputs.push(read_string(reader)?);
            }
            NODE_OUTPUT if wire == WireType::LengthDelimited => {
                node.outputs.push(read_string(reader)?);
            }
            NODE_NAME if wire == WireType::LengthDelimited => {
                node.name = read_string(reader)?;
            }
            NODE_OPTYPE if wire == WireType::LengthDelimited => {
                node.op_type = read_string(reader)?;
            }
            NODE_ATTRIBUTE if wire == WireType::LengthDelimited => {
                let bytes = reader.read_length_delimited()?;
                if let Some(attr) = parse_attribute(&mut Reader::new(bytes))? {
                    node.attributes.push(attr);
                }
            }
            _ => reader.skip(wire)?,
        }
    }

    Ok(node)
}

/// Attribute variants outside FLOAT/INT/INTS are recognized-and-discarded:
/// their bytes are consumed so later fields in the same message stay
/// aligned, but no `Attribute` is produced.
fn parse_attribute(reader: &mut Reader) -> InferResult<Option<Attribute>> {
    let mut name = None;
    let mut float_val = None;
    let mut int_val = None;
    let mut ints_val: Vec<i64> = Vec::new();

    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        match field {
            ATTR_NAME if wire == WireType::LengthDelimited => {
                name = Some(read_string(reader)?);
            }
            ATTR_INT if wire == WireType::Varint => {
                int_val = Some(reader.read_varint()? as i64);
            }
            ATTR_FLOAT if wire == WireType::Fixed32 => {
                float_val = Some(reader.read_f32()?);
            }
            ATTR_INTS => {
                read_packed_or_single_i64(reader, wire, &mut ints_val)?;
            }
            ATTR_TYPE if wire == WireType::Varint => {
                reader.read_varint()?; // type discriminator, not needed to decode correctly
            }
            _ => reader.skip(wire)?,
        }
    }

    let name = match name {
        Some(n) => n,
        None => return Ok(None),
    };

    let value = if !ints_val.is_empty() {
        AttributeValue::Ints(ints_val)
    } else if let Some(f) = float_val {
        AttributeValue::Float(f)
    } else if let Some(i) = int_val {
        AttributeValue::Int(i)
    } else {
        return Ok(None);
    };

    Ok(Some(Attribute { name, value }))
}

fn parse_tensor(reader: &mut Reader) -> InferResult<Tensor> {
    let mut name = None;
    let mut data_type = None;
    let mut dims: Vec<i64> = Vec::new();
    let mut float_data: Vec<f32> = Vec::new();
    let mut raw_data: Option<Vec<u8>> = None;

    while reader.has_remaining() {
        let (field, wire) = reader.read_tag()?;
        match field {
            TENSOR_DIMS => {
                read_packed_or_single_i64(reader, wire, &mut dims)?;
            }
            TENSOR_DATA_TYPE if wire == WireType::Varint => {
                data_type = Some(reader.read_varint()? as i64);
            }
            TENSOR_FLOAT_DATA => {
                read_packed_or_single_f32(reader, wire, &mut float_data)?;
            }
            TENSOR_NAME if wire == WireType::LengthDelimited => {
                name = Some(read_string(reader)?);
            }
            TENSOR_RAW_DATA if wire == WireType::LengthDelimited => {
                raw_data = Some(reader.read_length_delimited()?.to_vec());
            }
            _ => reader.skip(wire)?,
        }
    }

    if let Some(dt) = data_type {
        if dt != ELEM_TYPE_FLOAT {
            return Err(InferError::ParseError {
                offset: reader.pos(),
                what: format!("unsupported tensor element type code {dt}, only FLOAT (1) is accepted"),
            });
        }
    }

    let name = name.ok_or_else(|| InferError::ParseError {
        offset: reader.pos(),
        what: "initializer tensor is missing a name".to_string(),
    })?;

    let values = match raw_data {
        Some(bytes) => {
            if bytes.len() % 4 != 0 {
                return Err(InferError::ParseError {
                    offset: reader.pos(),
                    what: "raw_data length is not a multiple of 4 bytes".to_string(),
                });
            }
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect::<Vec<f32>>()
        }
        None => float_data,
    };

    let shape = dims_to_nchw(&dims)?;
    Tensor::from_vec(name, shape, values)
}
