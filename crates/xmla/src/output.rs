//! Rowset rendering for the terminal and for `--json`.

use anyhow::Result;
use console::{Style, style};
use serde_json::{Map, Number, Value as Json};
use xmla_driver::{RowCursor, Value};

/// Print every row of `cursor`, as a table or as a JSON array of objects.
pub fn print_rowset(cursor: &mut RowCursor, json: bool) -> Result<()> {
    let columns = cursor.columns().to_vec();
    let mut rows = Vec::with_capacity(cursor.len());
    cursor.before_first();
    while cursor.next() {
        let mut row = Vec::with_capacity(columns.len());
        for index in 1..=columns.len() {
            row.push(cursor.get_object(index)?);
        }
        rows.push(row);
    }

    if json {
        let objects: Vec<Json> = rows
            .iter()
            .map(|row| {
                let map: Map<String, Json> = columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(to_json))
                    .collect();
                Json::Object(map)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(render).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let dim = Style::new().dim();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("{name:<w$}"))
        .collect();
    println!("{}", style(header.join("  ")).bold());
    let rule = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    println!("{}", dim.apply_to("─".repeat(rule)));
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
    println!();
    println!("{}", dim.apply_to(format!("{} row(s)", cells.len())));
    Ok(())
}

fn render(value: &Option<Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

fn to_json(value: &Option<Value>) -> Json {
    match value {
        None | Some(Value::Null) => Json::Null,
        Some(Value::Bool(b)) => Json::Bool(*b),
        Some(Value::Int(i)) => Json::Number((*i).into()),
        Some(Value::Double(d)) => Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Some(Value::Text(s)) => Json::String(s.clone()),
    }
}
