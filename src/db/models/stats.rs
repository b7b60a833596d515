//! Aggregate statistics models.

use serde::Serialize;
use std::collections::BTreeMap;

/// Minutes per tag for one calendar month
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthTagMinutes {
    /// 1-12
    pub month: u32,
    pub name: &'static str,
    pub tags: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTagStats {
    pub year: i32,
    /// Always twelve entries, January first
    pub months: Vec<MonthTagMinutes>,
}

impl MonthlyTagStats {
    pub fn month(&self, month: u32) -> Option<&MonthTagMinutes> {
        self.months.iter().find(|m| m.month == month)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub tables: Vec<TableCount>,
    pub size_bytes: i64,
}
