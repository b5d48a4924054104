//! Long ↔ wide reshaping of item scores.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{AnalysisError, Result};

/// One (subject, item, value) observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemScore {
    pub subject: String,
    pub item: String,
    pub value: f64,
}

/// Numeric labels sort numerically ("2" < "10"), everything else lexically after.
fn item_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Subjects × items, possibly with holes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    pub subjects: Vec<String>,
    pub items: Vec<String>,
    /// `cells[subject][item]`
    pub cells: Vec<Vec<Option<f64>>>,
}

/// Subjects × items with every cell present.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteMatrix {
    pub subjects: Vec<String>,
    pub items: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    /// Subjects dropped for having at least one missing item.
    pub excluded: usize,
}

impl CompleteMatrix {
    pub fn n_subjects(&self) -> usize {
        self.rows.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }
}

impl ScoreMatrix {
    /// Pivot long scores into one row per subject, one column per item.
    ///
    /// Repeated (subject, item) pairs must carry the same value; a
    /// different value is a [`AnalysisError::ConflictingCell`].
    pub fn from_long(scores: &[ItemScore]) -> Result<Self> {
        let mut by_cell: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        let mut items: BTreeSet<&str> = BTreeSet::new();
        for s in scores {
            items.insert(s.item.as_str());
            match by_cell.get(&(s.subject.as_str(), s.item.as_str())) {
                Some(&first) if first != s.value => {
                    return Err(AnalysisError::ConflictingCell {
                        subject: s.subject.clone(),
                        item: s.item.clone(),
                        first,
                        second: s.value,
                    })
                }
                Some(_) => {}
                None => {
                    by_cell.insert((s.subject.as_str(), s.item.as_str()), s.value);
                }
            }
        }

        let mut items: Vec<&str> = items.into_iter().collect();
        items.sort_by(|a, b| item_order(a, b));
        let col_of: BTreeMap<&str, usize> =
            items.iter().enumerate().map(|(i, &it)| (it, i)).collect();

        let mut subjects: Vec<String> = Vec::new();
        let mut cells: Vec<Vec<Option<f64>>> = Vec::new();
        for ((subject, item), value) in by_cell {
            if subjects.last().map(String::as_str) != Some(subject) {
                subjects.push(subject.to_string());
                cells.push(vec![None; items.len()]);
            }
            if let (Some(row), Some(&col)) = (cells.last_mut(), col_of.get(item)) {
                row[col] = Some(value);
            }
        }

        Ok(Self {
            subjects,
            items: items.into_iter().map(str::to_string).collect(),
            cells,
        })
    }

    /// Back to long form, subject-major, skipping empty cells.
    pub fn to_long(&self) -> Vec<ItemScore> {
        self.subjects
            .iter()
            .zip(&self.cells)
            .flat_map(|(subject, row)| {
                self.items.iter().zip(row).filter_map(move |(item, cell)| {
                    cell.map(|value| ItemScore {
                        subject: subject.clone(),
                        item: item.clone(),
                        value,
                    })
                })
            })
            .collect()
    }

    pub fn get(&self, subject: &str, item: &str) -> Option<f64> {
        let r = self.subjects.iter().position(|s| s == subject)?;
        let c = self.items.iter().position(|i| i == item)?;
        self.cells[r][c]
    }

    /// Listwise deletion: keep only subjects observed on every item.
    pub fn complete_rows(&self) -> CompleteMatrix {
        let mut subjects = Vec::new();
        let mut rows = Vec::new();
        for (subject, row) in self.subjects.iter().zip(&self.cells) {
            if let Some(values) = row.iter().copied().collect::<Option<Vec<f64>>>() {
                subjects.push(subject.clone());
                rows.push(values);
            }
        }
        let excluded = self.subjects.len() - subjects.len();
        debug!(kept = subjects.len(), excluded, "listwise deletion");
        CompleteMatrix {
            subjects,
            items: self.items.clone(),
            rows,
            excluded,
        }
    }
}
