//! Snapshot persistence codecs.
//!
//! Two on-disk forms share the same logical shape (counters + flat node and
//! edge records):
//!
//! - **binary**: a compact little-endian, byte-tagged format. Preserves every
//!   value variant exactly, including the int/float distinction.
//! - **text**: pretty-printed JSON for human inspection and interchange.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::snapshot::{EdgeRecord, NodeRecord, Snapshot};
use crate::value::Value;

const MAGIC: &[u8; 4] = b"QVDB";
const VERSION: u8 = 1;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_MAP: u8 = 6;

/// Writes a snapshot to `path` in the binary format.
pub fn save_binary(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, encode_snapshot(snapshot))?;
    Ok(())
}

/// Reads a binary snapshot from `path`.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Snapshot> {
    let bytes = fs::read(path)?;
    decode_snapshot(&bytes)
}

/// Writes a snapshot to `path` as pretty-printed JSON.
pub fn save_text(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    let json = snapshot_to_json(snapshot);
    fs::write(path, serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

/// Reads a JSON snapshot from `path`.
pub fn load_text(path: impl AsRef<Path>) -> Result<Snapshot> {
    let text = fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    snapshot_from_json(&json)
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    write_u64(&mut out, snapshot.next_node_id);
    write_u64(&mut out, snapshot.next_edge_id);

    write_u64(&mut out, snapshot.nodes.len() as u64);
    for node in &snapshot.nodes {
        write_u64(&mut out, node.id);
        write_u32(&mut out, node.labels.len() as u32);
        for label in &node.labels {
            write_string(&mut out, label);
        }
        write_properties(&mut out, &node.properties);
    }

    write_u64(&mut out, snapshot.edges.len() as u64);
    for edge in &snapshot.edges {
        write_u64(&mut out, edge.id);
        write_u64(&mut out, edge.src);
        write_u64(&mut out, edge.dst);
        write_string(&mut out, &edge.rel_type);
        write_properties(&mut out, &edge.properties);
    }
    out
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let mut reader = Reader::new(bytes);
    if reader.read_bytes(4)? != &MAGIC[..] {
        return Err(Error::InvalidMagic);
    }
    let version = reader.read_u8()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let next_node_id = reader.read_u64()?;
    let next_edge_id = reader.read_u64()?;

    let node_count = reader.read_u64()? as usize;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let id = reader.read_u64()?;
        let label_count = reader.read_u32()? as usize;
        let mut labels = Vec::with_capacity(label_count);
        for _ in 0..label_count {
            labels.push(reader.read_string()?);
        }
        let properties = reader.read_properties()?;
        nodes.push(NodeRecord {
            id,
            labels,
            properties,
        });
    }

    let edge_count = reader.read_u64()? as usize;
    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let id = reader.read_u64()?;
        let src = reader.read_u64()?;
        let dst = reader.read_u64()?;
        let rel_type = reader.read_string()?;
        let properties = reader.read_properties()?;
        edges.push(EdgeRecord {
            id,
            src,
            dst,
            rel_type,
            properties,
        });
    }

    if !reader.is_empty() {
        return Err(Error::Corrupt("trailing bytes after snapshot"));
    }
    Ok(Snapshot {
        next_node_id,
        next_edge_id,
        nodes,
        edges,
    })
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn write_properties(out: &mut Vec<u8>, properties: &BTreeMap<String, Value>) {
    write_u32(out, properties.len() as u32);
    for (key, value) in properties {
        write_string(out, key);
        write_value(out, value);
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Value::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_string(out, s);
        }
        Value::List(items) => {
            out.push(TAG_LIST);
            write_u32(out, items.len() as u32);
            for item in items {
                write_value(out, item);
            }
        }
        Value::Map(map) => {
            out.push(TAG_MAP);
            write_u32(out, map.len() as u32);
            for (key, item) in map {
                write_string(out, key);
                write_value(out, item);
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::Corrupt("unexpected end of snapshot"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Corrupt("invalid utf-8 in string"))
    }

    fn read_properties(&mut self) -> Result<BTreeMap<String, Value>> {
        let count = self.read_u32()? as usize;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_value()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    fn read_value(&mut self) -> Result<Value> {
        match self.read_u8()? {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => Ok(Value::Bool(self.read_u8()? != 0)),
            TAG_INT => Ok(Value::Int(self.read_i64()?)),
            TAG_FLOAT => Ok(Value::Float(self.read_f64()?)),
            TAG_STRING => Ok(Value::String(self.read_string()?)),
            TAG_LIST => {
                let count = self.read_u32()? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                Ok(Value::List(items))
            }
            TAG_MAP => {
                let count = self.read_u32()? as usize;
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    let key = self.read_string()?;
                    let value = self.read_value()?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            _ => Err(Error::Corrupt("unknown value tag")),
        }
    }
}

fn snapshot_to_json(snapshot: &Snapshot) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = snapshot
        .nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "id": n.id,
                "labels": n.labels,
                "properties": properties_to_json(&n.properties),
            })
        })
        .collect();
    let edges: Vec<serde_json::Value> = snapshot
        .edges
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "src": e.src,
                "dst": e.dst,
                "type": e.rel_type,
                "properties": properties_to_json(&e.properties),
            })
        })
        .collect();
    serde_json::json!({
        "next_node_id": snapshot.next_node_id,
        "next_edge_id": snapshot.next_edge_id,
        "nodes": nodes,
        "edges": edges,
    })
}

fn properties_to_json(properties: &BTreeMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn snapshot_from_json(json: &serde_json::Value) -> Result<Snapshot> {
    let next_node_id = json_u64(json, "next_node_id")?;
    let next_edge_id = json_u64(json, "next_edge_id")?;

    let mut nodes = Vec::new();
    for entry in json_array(json, "nodes")? {
        nodes.push(NodeRecord {
            id: json_u64(entry, "id")?,
            labels: json_array(entry, "labels")?
                .iter()
                .map(|l| {
                    l.as_str()
                        .map(str::to_string)
                        .ok_or(Error::Corrupt("label must be a string"))
                })
                .collect::<Result<Vec<_>>>()?,
            properties: json_properties(entry)?,
        });
    }

    let mut edges = Vec::new();
    for entry in json_array(json, "edges")? {
        edges.push(EdgeRecord {
            id: json_u64(entry, "id")?,
            src: json_u64(entry, "src")?,
            dst: json_u64(entry, "dst")?,
            rel_type: entry
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or(Error::Corrupt("edge type must be a string"))?
                .to_string(),
            properties: json_properties(entry)?,
        });
    }

    Ok(Snapshot {
        next_node_id,
        next_edge_id,
        nodes,
        edges,
    })
}

fn json_u64(json: &serde_json::Value, key: &'static str) -> Result<u64> {
    json.get(key)
        .and_then(|v| v.as_u64())
        .ok_or(Error::Corrupt("missing or non-integer field"))
}

fn json_array<'a>(
    json: &'a serde_json::Value,
    key: &'static str,
) -> Result<&'a Vec<serde_json::Value>> {
    json.get(key)
        .and_then(|v| v.as_array())
        .ok_or(Error::Corrupt("missing or non-array field"))
}

fn json_properties(entry: &serde_json::Value) -> Result<BTreeMap<String, Value>> {
    let object = entry
        .get("properties")
        .and_then(|p| p.as_object())
        .ok_or(Error::Corrupt("missing properties object"))?;
    Ok(object
        .iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn sample_store() -> Store {
        let mut store = Store::new();
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), Value::from("Alice"));
        props.insert("age".to_string(), Value::Int(33));
        props.insert("score".to_string(), Value::Float(0.5));
        props.insert(
            "tags".to_string(),
            Value::List(vec![Value::from("a"), Value::Int(2)]),
        );
        let mut nested = BTreeMap::new();
        nested.insert("city".to_string(), Value::from("Oslo"));
        props.insert("address".to_string(), Value::Map(nested));

        let a = store.create_node(vec!["Person".into()], props);
        let b = store.create_node(vec![], BTreeMap::new());
        store
            .create_edge(a, b, "KNOWS", BTreeMap::new())
            .unwrap();
        store
    }

    #[test]
    fn binary_round_trip_is_exact() {
        let snapshot = sample_store().snapshot();
        let decoded = decode_snapshot(&encode_snapshot(&snapshot)).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn text_round_trip_keeps_value_types() {
        let snapshot = sample_store().snapshot();
        let json = snapshot_to_json(&snapshot);
        let decoded = snapshot_from_json(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            decode_snapshot(b"NOPE"),
            Err(Error::InvalidMagic)
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let snapshot = sample_store().snapshot();
        let bytes = encode_snapshot(&snapshot);
        assert!(decode_snapshot(&bytes[..bytes.len() - 3]).is_err());
    }
}
