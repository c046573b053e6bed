use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{LabelSet, LogEntry, LogStream, LokiError, MatrixSeries, ResultType, ValuePoint, VectorSample};

/// Result of `/loki/api/v1/query`: metric queries yield a vector, log queries streams.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum VectorOrStreams {
    Vector(Vec<VectorSample>),
    Streams(Vec<LogStream>),
}

/// Result of `/loki/api/v1/query_range`: metric queries yield a matrix, log queries streams.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum MatrixOrStreams {
    Matrix(Vec<MatrixSeries>),
    Streams(Vec<LogStream>),
}

/// Result of `/loki/api/v1/index/volume_range`. Loki should answer with a matrix, but has been
/// seen declaring a vector instead.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum VectorOrMatrix {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
}

impl VectorOrStreams {
    pub fn result_type(&self) -> ResultType {
        match self {
            VectorOrStreams::Vector(_) => ResultType::Vector,
            VectorOrStreams::Streams(_) => ResultType::Streams,
        }
    }
}

impl MatrixOrStreams {
    pub fn result_type(&self) -> ResultType {
        match self {
            MatrixOrStreams::Matrix(_) => ResultType::Matrix,
            MatrixOrStreams::Streams(_) => ResultType::Streams,
        }
    }
}

impl VectorOrMatrix {
    pub fn result_type(&self) -> ResultType {
        match self {
            VectorOrMatrix::Vector(_) => ResultType::Vector,
            VectorOrMatrix::Matrix(_) => ResultType::Matrix,
        }
    }
}

struct Envelope<'a> {
    result_type: &'a str,
    result: &'a [Value],
}

fn required<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a Value, LokiError> {
    object.get(field).ok_or_else(|| LokiError::MissingField(field.to_string()))
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, LokiError> {
    value.as_object().ok_or_else(|| LokiError::MissingField(field.to_string()))
}

fn read_envelope(root: &Value) -> Result<Envelope<'_>, LokiError> {
    let root = as_object(root, "status")?;
    required(root, "status")?
        .as_str()
        .ok_or_else(|| LokiError::MissingField("status".to_string()))?;
    let data = as_object(required(root, "data")?, "data")?;
    let result_type = required(data, "resultType")?
        .as_str()
        .ok_or_else(|| LokiError::MissingField("resultType".to_string()))?;
    let result = required(data, "result")?
        .as_array()
        .ok_or_else(|| LokiError::MissingField("result".to_string()))?;

    Ok(Envelope { result_type, result })
}

fn parse_body(body: &str) -> Result<Value, LokiError> {
    Ok(serde_json::from_str(body)?)
}

fn unsupported(result_type: &str, body: &str) -> LokiError {
    LokiError::UnsupportedResultType { result_type: result_type.to_string(), body: body.to_string() }
}

fn label_set(item: &Map<String, Value>, field: &str) -> Result<LabelSet, LokiError> {
    Ok(serde_json::from_value(required(item, field)?.clone())?)
}

fn sequence<'a>(item: &'a Map<String, Value>, field: &str) -> Result<&'a Vec<Value>, LokiError> {
    required(item, field)?
        .as_array()
        .ok_or_else(|| LokiError::MissingField(field.to_string()))
}

pub fn decode_vector(result: &[Value]) -> Result<Vec<VectorSample>, LokiError> {
    result
        .iter()
        .map(|item| {
            let item = as_object(item, "metric")?;
            Ok(VectorSample {
                metric: label_set(item, "metric")?,
                value: ValuePoint::from_json(required(item, "value")?)?,
            })
        })
        .collect()
}

pub fn decode_matrix(result: &[Value]) -> Result<Vec<MatrixSeries>, LokiError> {
    result
        .iter()
        .map(|item| {
            let item = as_object(item, "metric")?;
            Ok(MatrixSeries {
                metric: label_set(item, "metric")?,
                values: sequence(item, "values")?.iter().map(ValuePoint::from_json).collect::<Result<_, _>>()?,
            })
        })
        .collect()
}

pub fn decode_streams(result: &[Value]) -> Result<Vec<LogStream>, LokiError> {
    result
        .iter()
        .map(|item| {
            let item = as_object(item, "stream")?;
            Ok(LogStream {
                stream: label_set(item, "stream")?,
                values: sequence(item, "values")?.iter().map(LogEntry::from_json).collect::<Result<_, _>>()?,
            })
        })
        .collect()
}

pub fn decode_vector_or_streams(body: &str) -> Result<VectorOrStreams, LokiError> {
    let root = parse_body(body)?;
    let envelope = read_envelope(&root)?;
    match envelope.result_type {
        "vector" => Ok(VectorOrStreams::Vector(decode_vector(envelope.result)?)),
        "streams" => Ok(VectorOrStreams::Streams(decode_streams(envelope.result)?)),
        other => Err(unsupported(other, body)),
    }
}

pub fn decode_matrix_or_streams(body: &str) -> Result<MatrixOrStreams, LokiError> {
    let root = parse_body(body)?;
    let envelope = read_envelope(&root)?;
    match envelope.result_type {
        "matrix" => Ok(MatrixOrStreams::Matrix(decode_matrix(envelope.result)?)),
        "streams" => Ok(MatrixOrStreams::Streams(decode_streams(envelope.result)?)),
        other => Err(unsupported(other, body)),
    }
}

pub fn decode_vector_or_matrix(body: &str) -> Result<VectorOrMatrix, LokiError> {
    let root = parse_body(body)?;
    let envelope = read_envelope(&root)?;
    match envelope.result_type {
        "matrix" => Ok(VectorOrMatrix::Matrix(decode_matrix(envelope.result)?)),
        "vector" => match decode_matrix(envelope.result) {
            Ok(matrix) if !envelope.result.is_empty() => Ok(VectorOrMatrix::Matrix(matrix)),
            _ => {
                debug!("Loki declared a vector for a time series request, decoding it as vector");
                Ok(VectorOrMatrix::Vector(decode_vector(envelope.result)?))
            }
        },
        other => Err(unsupported(other, body)),
    }
}

/// For endpoints that only ever answer with a vector, like `/index/volume`.
pub fn decode_vector_response(body: &str) -> Result<Vec<VectorSample>, LokiError> {
    let root = parse_body(body)?;
    let envelope = read_envelope(&root)?;
    match envelope.result_type {
        "vector" => decode_vector(envelope.result),
        other => Err(unsupported(other, body)),
    }
}

/// Decodes the fixed shapes without a `resultType` discriminator.
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, LokiError> {
    Ok(serde_json::from_str(body)?)
}
