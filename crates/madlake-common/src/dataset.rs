//! In-memory tabular dataset model
//!
//! Every stage of the pipeline consumes and produces [`Dataset`] values: a
//! named collection of typed columns and rows. Row order carries no meaning.
//! Datasets are owned by exactly one stage at a time and discarded after
//! upload; nothing here persists across invocations.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{LakeError, Result};
use crate::text::lossy_utf8;

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Bool => write!(f, "bool"),
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view: ints widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Canonical key form used for joins and grouping.
    ///
    /// Floats and nulls are not joinable: rows keyed on them fall out of
    /// inner joins, matching the "discard unmatched" contract.
    pub fn join_key(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Float(_) | Value::Null => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Descriptive metadata attached to a dataset on upload.
///
/// Documentation for downstream consumers; nothing here is structurally
/// enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub description: String,
    pub transformations: String,
    pub primary_keys: Vec<String>,
}

impl DatasetMeta {
    pub fn new(description: impl Into<String>, transformations: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            transformations: transformations.into(),
            primary_keys: Vec::new(),
        }
    }

    /// Flatten into the string map an object store attaches to an object.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("description".to_string(), self.description.clone());
        map.insert("transformations".to_string(), self.transformations.clone());
        if !self.primary_keys.is_empty() {
            map.insert("primary_keys".to_string(), self.primary_keys.join(","));
        }
        map
    }
}

/// A named, schema-typed tabular collection of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Column index or a [`LakeError::MissingColumn`] naming this dataset.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| LakeError::MissingColumn {
            dataset: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(LakeError::RowArity {
                dataset: self.name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Drop the named columns deterministically. Names with no matching
    /// column are ignored, so recipes stay total over schema drift.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !names.contains(&c.name.as_str()))
            .map(|(i, _)| i)
            .collect();

        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Append a derived column computed per-row.
    pub fn add_column<F>(&mut self, name: impl Into<String>, ty: ColumnType, f: F) -> Result<()>
    where
        F: Fn(&Dataset, &[Value]) -> Result<Value>,
    {
        let mut derived = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            derived.push(f(self, row)?);
        }
        self.columns.push(Column::new(name, ty));
        for (row, value) in self.rows.iter_mut().zip(derived) {
            row.push(value);
        }
        Ok(())
    }

    /// Re-encode every text cell through lossy UTF-8 normalization.
    ///
    /// Rust strings are already valid UTF-8, so this is a no-op for data that
    /// entered through our own decoders; it exists so recipes can declare the
    /// normalization as part of their contract.
    pub fn normalize_text(&mut self) {
        for row in &mut self.rows {
            for value in row.iter_mut() {
                if let Value::Text(s) = value {
                    *value = Value::Text(lossy_utf8(s.as_bytes()));
                }
            }
        }
    }

    /// Inner join on one key column per side.
    ///
    /// Output columns are this dataset's columns followed by the right-hand
    /// columns minus its key column. Rows whose key has no partner on the
    /// other side are discarded, as are rows with a null or non-joinable key.
    pub fn inner_join(
        &self,
        right: &Dataset,
        left_key: &str,
        right_key: &str,
        out_name: impl Into<String>,
    ) -> Result<Dataset> {
        let lk = self.require_column(left_key)?;
        let rk = right.require_column(right_key)?;

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(key) = row[rk].join_key() {
                index.entry(key).or_default().push(i);
            }
        }

        let mut columns = self.columns.clone();
        for (i, col) in right.columns.iter().enumerate() {
            if i != rk {
                columns.push(col.clone());
            }
        }

        let mut out = Dataset::new(out_name, columns);
        for row in &self.rows {
            let Some(key) = row[lk].join_key() else {
                continue;
            };
            let Some(matches) = index.get(&key) else {
                continue;
            };
            for &ri in matches {
                let mut joined = row.clone();
                for (i, value) in right.rows[ri].iter().enumerate() {
                    if i != rk {
                        joined.push(value.clone());
                    }
                }
                out.rows.push(joined);
            }
        }

        if out.rows.is_empty() && !self.rows.is_empty() {
            return Err(LakeError::EmptyJoin {
                left: self.name.clone(),
                right: right.name.clone(),
                key: left_key.to_string(),
            });
        }
        Ok(out)
    }

    /// Distinct non-null text values of a column, in first-seen order.
    pub fn distinct_text(&self, column: &str) -> Result<Vec<String>> {
        let idx = self.require_column(column)?;
        let mut seen = HashMap::new();
        let mut out = Vec::new();
        for row in &self.rows {
            if let Value::Text(s) = &row[idx] {
                if seen.insert(s.clone(), ()).is_none() {
                    out.push(s.clone());
                }
            }
        }
        Ok(out)
    }

    /// Group by the named columns and count rows per group.
    ///
    /// Result order is sorted by the canonical key so callers get stable
    /// output across runs.
    pub fn group_count(&self, columns: &[&str]) -> Result<Vec<(Vec<Value>, i64)>> {
        let idxs: Vec<usize> = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<_>>()?;

        let mut groups: BTreeMap<Vec<String>, (Vec<Value>, i64)> = BTreeMap::new();
        for row in &self.rows {
            let Some(key) = idxs
                .iter()
                .map(|&i| row[i].join_key())
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let entry = groups
                .entry(key)
                .or_insert_with(|| (idxs.iter().map(|&i| row[i].clone()).collect(), 0));
            entry.1 += 1;
        }
        Ok(groups.into_values().collect())
    }

    /// Decode a CSV extract into a dataset.
    ///
    /// First record is the header. Cell text is decoded lossily, so arbitrary
    /// byte input never fails on encoding. Column types are inferred from the
    /// data: all-integer columns become `Int`, all-numeric become `Float`,
    /// anything else `Text`. Empty cells are `Null`.
    pub fn from_csv(name: impl Into<String>, bytes: &[u8]) -> Result<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut records = reader.byte_records();
        let header = match records.next() {
            Some(rec) => rec?,
            None => return Ok(Dataset::new(name, Vec::new())),
        };
        let names: Vec<String> = header.iter().map(lossy_utf8).collect();

        let mut cells: Vec<Vec<Option<String>>> = Vec::new();
        for record in records {
            let record = record?;
            let mut row: Vec<Option<String>> = record
                .iter()
                .take(names.len())
                .map(|c| {
                    let s = lossy_utf8(c);
                    if s.is_empty() {
                        None
                    } else {
                        Some(s)
                    }
                })
                .collect();
            row.resize(names.len(), None);
            cells.push(row);
        }

        let types: Vec<ColumnType> = (0..names.len())
            .map(|i| infer_type(cells.iter().filter_map(|r| r[i].as_deref())))
            .collect();

        let columns = names
            .into_iter()
            .zip(types.iter().copied())
            .map(|(n, t)| Column::new(n, t))
            .collect();
        let mut dataset = Dataset::new(name, columns);
        for row in cells {
            let values = row
                .into_iter()
                .zip(types.iter())
                .map(|(cell, ty)| match cell {
                    None => Value::Null,
                    Some(s) => parse_typed(&s, *ty),
                })
                .collect();
            dataset.push_row(values)?;
        }
        Ok(dataset)
    }
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut saw_any = false;
    let mut all_int = true;
    let mut all_float = true;
    for v in values {
        saw_any = true;
        if v.trim().parse::<i64>().is_err() {
            all_int = false;
        }
        if v.trim().parse::<f64>().is_err() {
            all_float = false;
        }
        if !all_int && !all_float {
            return ColumnType::Text;
        }
    }
    match (saw_any, all_int, all_float) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Int,
        (true, false, true) => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

fn parse_typed(s: &str, ty: ColumnType) -> Value {
    match ty {
        ColumnType::Int => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        ColumnType::Float => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        ColumnType::Bool => s
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(s.to_string()),
    }
}
