use std::collections::HashMap;

use thiserror::Error;

use super::FMRS_NAMESPACE;
use crate::layout::LayoutInfo;
use crate::value::{FieldType, FieldValue};
use crate::xml::{Document, Element};

const ROOT: &str = "fmresultset";
const ERROR: &str = "error";
const DATASOURCE: &str = "datasource";
const METADATA: &str = "metadata";
const RESULTSET: &str = "resultset";
const FIELD: &str = "field";
const DATA: &str = "data";

/// Structural decode failures. Leaf-level defects never reach this enum;
/// they degrade to empty strings and zero values instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("server returned error code {0}")]
    Server(i64),

    #[error("required node '{0}' missing from response")]
    MissingNode(&'static str),
}

/// Meta information for a database, from the response's data-source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// The date format indicated by the server.
    pub date_format: String,
    /// The time format indicated by the server.
    pub time_format: String,
    /// The timestamp format indicated by the server.
    pub timestamp_format: String,
    /// The total number of records in the database.
    pub record_count: u64,
}

impl DatabaseInfo {
    fn from_node(node: &Element) -> Self {
        DatabaseInfo {
            date_format: node
                .attribute("date-format")
                .unwrap_or("MM/dd/yyyy")
                .to_string(),
            time_format: node.attribute("time-format").unwrap_or("HH:mm:ss").to_string(),
            timestamp_format: node
                .attribute("timestamp-format")
                .unwrap_or("MM/dd/yyyy HH:mm:ss")
                .to_string(),
            record_count: node
                .attribute("total-count")
                .and_then(|count| count.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// A type of record item.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordItem {
    /// An individual field.
    Field(String, FieldValue),
    /// A related set holding the list of related records.
    RelatedSet(String, Vec<Record>),
}

impl RecordItem {
    pub fn name(&self) -> &str {
        match self {
            RecordItem::Field(name, _) => name,
            RecordItem::RelatedSet(name, _) => name,
        }
    }
}

/// An individual result set record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record id, `-1` when the response does not carry one.
    pub record_id: i64,
    /// The contained items, keyed by field or related-set name. The last
    /// item wins if the response repeats a name.
    pub elements: HashMap<String, RecordItem>,
}

impl Record {
    /// A top-level record: fields resolve their type by bare name, child
    /// related sets switch to table scope.
    fn from_node(node: &Element, types: &HashMap<String, FieldType>) -> Self {
        let mut elements = HashMap::new();
        for child in node.child_elements() {
            let item = if child.name == FIELD {
                field_item(child, types, None)
            } else {
                let table = child.attribute("table").unwrap_or_default().to_string();
                let records = child
                    .child_elements()
                    .map(|related| Record::from_related_node(&table, related, types))
                    .collect();
                RecordItem::RelatedSet(table, records)
            };
            elements.insert(item.name().to_string(), item);
        }
        Record {
            record_id: record_id(node),
            elements,
        }
    }

    /// A record nested in a related set: every child is a field, and its
    /// type is resolved by the composite `table::field` key.
    fn from_related_node(
        table: &str,
        node: &Element,
        types: &HashMap<String, FieldType>,
    ) -> Self {
        let mut elements = HashMap::new();
        for child in node.child_elements() {
            let item = field_item(child, types, Some(table));
            elements.insert(item.name().to_string(), item);
        }
        Record {
            record_id: record_id(node),
            elements,
        }
    }
}

fn record_id(node: &Element) -> i64 {
    node.attribute("record-id")
        .and_then(|id| id.parse().ok())
        .unwrap_or(-1)
}

fn field_item(
    node: &Element,
    types: &HashMap<String, FieldType>,
    table_scope: Option<&str>,
) -> RecordItem {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let ty = match table_scope {
        Some(table) => types.get(&format!("{table}::{name}")),
        None => types.get(&name),
    }
    .copied()
    .unwrap_or(FieldType::Text);
    let raw = node
        .child_elements()
        .find(|child| child.name == DATA)
        .map(|data| data.text())
        .unwrap_or_default();
    RecordItem::Field(name, FieldValue::new(raw, ty))
}

/// The result set produced by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Database meta info.
    pub database_info: DatabaseInfo,
    /// Layout meta info.
    pub layout_info: LayoutInfo,
    /// The number of records found by the query.
    pub found_count: u64,
    /// The records produced by the query.
    pub records: Vec<Record>,
}

/// Walks a parsed response document into a [`ResultSet`].
///
/// Fails fast on structural problems: a non-zero error code, or any of the
/// three required grammar nodes missing. Once the structure is confirmed,
/// individual field and record defects degrade silently to defaults.
pub fn decode(doc: &Document) -> Result<ResultSet, DecodeError> {
    let root = doc.root();
    if root.name != ROOT || root.namespace.as_deref() != Some(FMRS_NAMESPACE) {
        return Err(DecodeError::MissingNode(ROOT));
    }

    let namespace = Some(FMRS_NAMESPACE);
    if let Some(error) = root.child(namespace, ERROR) {
        if let Some(code) = error.attribute("code").and_then(|code| code.parse::<i64>().ok()) {
            // 0 and 200 both mean "no error" on the wire.
            if code != 0 && code != 200 {
                return Err(DecodeError::Server(code));
            }
        }
    }

    let datasource = root
        .child(namespace, DATASOURCE)
        .ok_or(DecodeError::MissingNode(DATASOURCE))?;
    let metadata = root
        .child(namespace, METADATA)
        .ok_or(DecodeError::MissingNode(METADATA))?;
    let resultset = root
        .child(namespace, RESULTSET)
        .ok_or(DecodeError::MissingNode(RESULTSET))?;

    let layout_info = LayoutInfo::from_node(metadata);
    let types = layout_info.field_types();
    let records = resultset
        .child_elements()
        .map(|record| Record::from_node(record, &types))
        .collect();

    Ok(ResultSet {
        database_info: DatabaseInfo::from_node(datasource),
        layout_info,
        found_count: resultset
            .attribute("count")
            .and_then(|count| count.parse().ok())
            .unwrap_or(0),
        records,
    })
}
