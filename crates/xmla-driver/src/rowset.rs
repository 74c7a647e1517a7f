//! Decoding of XMLA tabular rowsets into a [`RowCursor`].
//!
//! A rowset looks like
//!
//! ```xml
//! <root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset">
//!   <xsd:schema>
//!     <xsd:complexType name="row">
//!       <xsd:sequence>
//!         <xsd:element sql:field="[Store].[Store Name]" name="_x005B_Store_x005D_" type="xsd:string"/>
//!       </xsd:sequence>
//!     </xsd:complexType>
//!   </xsd:schema>
//!   <row><_x005B_Store_x005D_>Store 7</_x005B_Store_x005D_></row>
//! </root>
//! ```
//!
//! usually wrapped in a SOAP envelope. Columns follow the schema; without a
//! schema they follow the order cells are first seen.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, trace};
use xmla_client::soap::check_fault;

use crate::cursor::RowCursor;
use crate::error::{DriverError, Result};
use crate::value::Value;

/// How cells of a column are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Double,
    Bool,
    Text,
}

impl ColumnKind {
    /// Map an XML schema type (`xsd:int`, `double`, ...) to a kind.
    pub fn from_xsd(type_name: &str) -> Self {
        let local = type_name.rsplit(':').next().unwrap_or(type_name);
        match local {
            "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedLong"
            | "unsignedShort" | "unsignedByte" | "nonNegativeInteger" | "positiveInteger"
            | "negativeInteger" | "nonPositiveInteger" => ColumnKind::Int,
            "double" | "float" | "decimal" => ColumnKind::Double,
            "boolean" => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }
}

/// A column as declared by the rowset schema.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SchemaColumn {
    element: String,
    label: String,
    kind: ColumnKind,
}

/// Decode a response body into a cursor.
///
/// A SOAP fault in place of a result is reported as [`DriverError::Fault`].
pub fn decode_rowset(body: &[u8]) -> Result<RowCursor> {
    if let Some(fault) = check_fault(body) {
        return Err(DriverError::Fault {
            code: fault.code,
            message: fault.message,
        });
    }

    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut schema: Vec<SchemaColumn> = Vec::new();
    let mut schema_depth = 0usize;
    let mut in_row_type = false;

    let mut rows: Vec<HashMap<String, String>> = Vec::new();
    let mut seen_order: Vec<String> = Vec::new();
    let mut current_row: Option<HashMap<String, String>> = None;
    let mut current_cell: Option<(String, String)> = None;
    let mut nested = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if schema_depth > 0 {
                    schema_depth += 1;
                    match name.as_str() {
                        "complexType" => in_row_type = attribute(&e, "name").as_deref() == Some("row"),
                        "element" if in_row_type => schema.push(schema_column(&e)?),
                        _ => {}
                    }
                } else if name == "schema" {
                    schema_depth = 1;
                } else if current_cell.is_some() {
                    nested += 1;
                } else if current_row.is_some() {
                    current_cell = Some((name, String::new()));
                } else if name == "row" {
                    current_row = Some(HashMap::new());
                } else if name == "root" {
                    saw_root = true;
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if schema_depth > 0 {
                    if name == "element" && in_row_type {
                        schema.push(schema_column(&e)?);
                    }
                } else if current_cell.is_none()
                    && let Some(row) = current_row.as_mut()
                {
                    note_column(&mut seen_order, &name);
                    row.insert(name, String::new());
                } else if name == "row" && current_row.is_none() {
                    rows.push(HashMap::new());
                } else if name == "root" {
                    saw_root = true;
                }
            }
            Event::Text(t) => {
                if nested == 0
                    && let Some((_, text)) = current_cell.as_mut()
                {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if nested == 0
                    && let Some((_, text)) = current_cell.as_mut()
                {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if schema_depth > 0 {
                    schema_depth -= 1;
                    if schema_depth == 0 {
                        in_row_type = false;
                    }
                } else if nested > 0 {
                    nested -= 1;
                } else if let Some((name, text)) = current_cell.take() {
                    if let Some(row) = current_row.as_mut() {
                        note_column(&mut seen_order, &name);
                        row.insert(name, text);
                    }
                } else if let Some(row) = current_row.take() {
                    rows.push(row);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root && rows.is_empty() && schema.is_empty() {
        return Err(DriverError::Decode("response contains no rowset".to_string()));
    }

    let columns = if schema.is_empty() {
        seen_order
            .into_iter()
            .map(|element| SchemaColumn {
                label: decode_xml_name(&element),
                element,
                kind: ColumnKind::Text,
            })
            .collect()
    } else {
        schema
    };

    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut decoded = Vec::with_capacity(columns.len());
        for column in &columns {
            decoded.push(match row.get(&column.element) {
                Some(raw) => typed_value(column, raw)?,
                None => Value::Null,
            });
        }
        values.push(decoded);
    }

    debug!(columns = columns.len(), rows = values.len(), "Decoded rowset");
    Ok(RowCursor::new(
        columns.into_iter().map(|c| c.label).collect(),
        values,
    ))
}

fn note_column(seen: &mut Vec<String>, name: &str) {
    if !seen.iter().any(|s| s == name) {
        seen.push(name.to_string());
    }
}

fn schema_column(e: &BytesStart<'_>) -> Result<SchemaColumn> {
    let element = attribute(e, "name")
        .ok_or_else(|| DriverError::Decode("schema element without a name".to_string()))?;
    let label = attribute(e, "field").unwrap_or_else(|| decode_xml_name(&element));
    let kind = attribute(e, "type")
        .map(|t| ColumnKind::from_xsd(&t))
        .unwrap_or(ColumnKind::Text);
    trace!(element = %element, label = %label, ?kind, "Rowset column");
    Ok(SchemaColumn {
        element,
        label,
        kind,
    })
}

fn typed_value(column: &SchemaColumn, raw: &str) -> Result<Value> {
    let text = raw.trim();
    if column.kind != ColumnKind::Text && text.is_empty() {
        return Ok(Value::Null);
    }

    let parsed = match column.kind {
        ColumnKind::Text => Some(Value::Text(raw.to_string())),
        ColumnKind::Int => text.parse().ok().map(Value::Int),
        ColumnKind::Double => match text {
            "INF" => Some(Value::Double(f64::INFINITY)),
            "-INF" => Some(Value::Double(f64::NEG_INFINITY)),
            _ => text.parse().ok().map(Value::Double),
        },
        ColumnKind::Bool => match text {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
    };

    parsed.ok_or_else(|| {
        DriverError::Decode(format!(
            "value '{}' in column '{}' is not a valid {:?}",
            raw, column.label, column.kind
        ))
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Undo XML name escaping: `_xHHHH_` becomes the character U+HHHH.
pub fn decode_xml_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(start) = rest.find("_x") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &candidate[7..];
            }
            None => {
                out.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    out
}
