//! Dimension builders.
//!
//! Each builder selects a handful of raw columns, drops duplicate business
//! keys (first occurrence wins, input order kept) and renames the columns to
//! their canonical snake-case names. The declarative part lives in a
//! [`DimensionSpec`]; [`select_distinct`] does the work.
//!
//! ```text
//! raw (PRODUCTCODE, PRODUCTLINE, MSRP, ...)      dim_product
//! ┌──────────┬─────────────┬──────┐         ┌──────────────┬──────────────┬──────┐
//! │ S10_1678 │ Motorcycles │ 95   │    →    │ product_code │ product_line │ msrp │
//! │ S10_1678 │ Motorcycles │ 95   │         │ S10_1678     │ Motorcycles  │ 95   │
//! │ S10_1949 │ Classic Cars│ 214  │         │ S10_1949     │ Classic Cars │ 214  │
//! └──────────┴─────────────┴──────┘         └──────────────┴──────────────┴──────┘
//! ```

use std::collections::HashSet;

use chrono::Datelike;

use super::dates::{cell_to_date, quarter, DateKey};
use crate::error::{TransformError, TransformResult};
use crate::logs::log_info;
use crate::models::{Cell, CellKey, Table};

/// Source column holding the order date.
pub const ORDER_DATE: &str = "ORDERDATE";

pub const DIM_DATE: &str = "dim_date";
pub const DIM_PRODUCT: &str = "dim_product";
pub const DIM_CUSTOMER: &str = "dim_customer";
pub const DIM_ORDER: &str = "dim_order";

/// Column layout of the date dimension.
pub const DATE_COLUMNS: [&str; 6] = ["date_key", "order_date", "year", "quarter", "month", "day"];

/// Declarative description of a dimension table.
#[derive(Debug, Clone, Copy)]
pub struct DimensionSpec {
    /// Output table name.
    pub table: &'static str,
    /// `(source column, output column)` pairs, in output order.
    pub columns: &'static [(&'static str, &'static str)],
    /// Source columns forming the business key. `None` dedups on the full row.
    pub key: Option<&'static [&'static str]>,
}

pub const PRODUCT: DimensionSpec = DimensionSpec {
    table: DIM_PRODUCT,
    columns: &[
        ("PRODUCTCODE", "product_code"),
        ("PRODUCTLINE", "product_line"),
        ("MSRP", "msrp"),
    ],
    key: Some(&["PRODUCTCODE"]),
};

pub const CUSTOMER: DimensionSpec = DimensionSpec {
    table: DIM_CUSTOMER,
    columns: &[
        ("CUSTOMERNAME", "customer_name"),
        ("CONTACTFIRSTNAME", "contact_first_name"),
        ("CONTACTLASTNAME", "contact_last_name"),
        ("PHONE", "phone"),
        ("ADDRESSLINE1", "addressline1"),
        ("ADDRESSLINE2", "addressline2"),
        ("CITY", "city"),
        ("STATE", "state"),
        ("POSTALCODE", "postalcode"),
        ("COUNTRY", "country"),
        ("TERRITORY", "territory"),
    ],
    key: Some(&["CUSTOMERNAME"]),
};

pub const ORDER: DimensionSpec = DimensionSpec {
    table: DIM_ORDER,
    columns: &[("ORDERNUMBER", "order_number"), ("STATUS", "status")],
    key: Some(&["ORDERNUMBER"]),
};

/// Select, deduplicate and rename according to `spec`.
pub fn select_distinct(raw: &Table, spec: &DimensionSpec) -> TransformResult<Table> {
    let selected = spec
        .columns
        .iter()
        .map(|(source, _)| raw.require_column(source, spec.table))
        .collect::<TransformResult<Vec<_>>>()?;

    let key_idx = match spec.key {
        Some(key) => key
            .iter()
            .map(|source| raw.require_column(source, spec.table))
            .collect::<TransformResult<Vec<_>>>()?,
        None => selected.clone(),
    };

    let mut table = Table::new(spec.table, spec.columns.iter().map(|(_, target)| *target));
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::new();

    for row in raw.rows() {
        let key: Vec<CellKey<'_>> = key_idx.iter().map(|&i| row[i].key()).collect();
        if seen.insert(key) {
            table.push_row(selected.iter().map(|&i| row[i].clone()).collect());
        }
    }

    log_info(format!("{} complete. Shape: {:?}", spec.table, table.shape()));
    Ok(table)
}

/// Date dimension: one row per distinct calendar order date.
///
/// Rows without an order date contribute nothing; they surface in the fact
/// table with a null `date_key`.
pub fn build_dim_date(raw: &Table) -> TransformResult<Table> {
    log_info("Creating Date Dimension...");
    let idx = raw.require_column(ORDER_DATE, DIM_DATE)?;

    let mut table = Table::new(DIM_DATE, DATE_COLUMNS);
    let mut seen = HashSet::new();

    for (row_no, row) in raw.rows().iter().enumerate() {
        let date_parse = |value: String| TransformError::DateParse {
            column: ORDER_DATE.to_string(),
            row: row_no + 1,
            value,
        };

        let Some(date) = cell_to_date(&row[idx]).map_err(date_parse)? else {
            continue;
        };
        if !seen.insert(date) {
            continue;
        }

        let key = DateKey::from_date(date).ok_or_else(|| date_parse(row[idx].to_string()))?;
        table.push_row(vec![
            key.into(),
            Cell::Date(date),
            Cell::Int(i64::from(date.year())),
            Cell::Int(i64::from(quarter(date))),
            Cell::Int(i64::from(date.month())),
            Cell::Int(i64::from(date.day())),
        ]);
    }

    log_info(format!("{} complete. Shape: {:?}", DIM_DATE, table.shape()));
    Ok(table)
}

pub fn build_dim_product(raw: &Table) -> TransformResult<Table> {
    log_info("Creating Product Dimension...");
    select_distinct(raw, &PRODUCT)
}

pub fn build_dim_customer(raw: &Table) -> TransformResult<Table> {
    log_info("Creating Customer Dimension...");
    select_distinct(raw, &CUSTOMER)
}

pub fn build_dim_order(raw: &Table) -> TransformResult<Table> {
    log_info("Creating Order Dimension...");
    select_distinct(raw, &ORDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::{raw_table, sample_raw};
    use chrono::NaiveDate;

    #[test]
    fn test_date_dimension_example() {
        let raw = raw_table(
            &["ORDERDATE", "PRODUCTCODE", "SALES", "QUANTITYORDERED"],
            &[&["2024-01-15", "P1", "100.0", "2"]],
        );
        let dim = build_dim_date(&raw).unwrap();

        assert_eq!(dim.columns(), &DATE_COLUMNS);
        assert_eq!(
            dim.rows()[0],
            vec![
                Cell::Int(20240115),
                Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
                Cell::Int(2024),
                Cell::Int(1),
                Cell::Int(1),
                Cell::Int(15),
            ]
        );
    }

    #[test]
    fn test_date_dimension_collapses_time_of_day() {
        let raw = raw_table(
            &["ORDERDATE"],
            &[&["2/24/2003 0:00"], &["2/24/2003 15:30"], &["2003-02-24"], &["5/7/2003 0:00"]],
        );
        let dim = build_dim_date(&raw).unwrap();

        assert_eq!(dim.len(), 2);
        assert_eq!(dim.get(0, "date_key"), Some(&Cell::Int(20030224)));
        assert_eq!(dim.get(1, "date_key"), Some(&Cell::Int(20030507)));
    }

    #[test]
    fn test_date_dimension_skips_missing_dates() {
        let raw = raw_table(&["ORDERDATE"], &[&[""], &["2024-01-15"]]);
        let dim = build_dim_date(&raw).unwrap();
        assert_eq!(dim.len(), 1);
    }

    #[test]
    fn test_malformed_date_fails() {
        let raw = raw_table(&["ORDERDATE"], &[&["2024-01-15"], &["yesterday"]]);
        match build_dim_date(&raw) {
            Err(TransformError::DateParse { column, row, value }) => {
                assert_eq!(column, "ORDERDATE");
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected DateParse, got {:?}", other),
        }
    }

    #[test]
    fn test_product_keeps_first_occurrence() {
        let raw = raw_table(
            &["PRODUCTCODE", "PRODUCTLINE", "MSRP"],
            &[
                &["S10_1678", "Motorcycles", "95"],
                &["S10_1949", "Classic Cars", "214"],
                &["S10_1678", "Vintage Cars", "99"],
            ],
        );
        let dim = build_dim_product(&raw).unwrap();

        assert_eq!(dim.columns(), &["product_code", "product_line", "msrp"]);
        assert_eq!(dim.len(), 2);
        assert_eq!(dim.get(0, "product_line"), Some(&Cell::Text("Motorcycles".into())));
        assert_eq!(dim.get(1, "product_code"), Some(&Cell::Text("S10_1949".into())));
    }

    #[test]
    fn test_missing_column_names_column() {
        let raw = raw_table(&["ORDERNUMBER"], &[&["10107"]]);
        match build_dim_order(&raw) {
            Err(TransformError::MissingColumn { table, column }) => {
                assert_eq!(table, DIM_ORDER);
                assert_eq!(column, "STATUS");
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_full_row_dedup_without_key() {
        const STATUS_ONLY: DimensionSpec = DimensionSpec {
            table: "dim_status",
            columns: &[("STATUS", "status"), ("DEALSIZE", "deal_size")],
            key: None,
        };
        let raw = raw_table(
            &["STATUS", "DEALSIZE"],
            &[&["Shipped", "Small"], &["Shipped", "Small"], &["Shipped", "Large"]],
        );
        let dim = select_distinct(&raw, &STATUS_ONLY).unwrap();
        assert_eq!(dim.len(), 2);
    }

    #[test]
    fn test_business_keys_are_unique() {
        let raw = sample_raw();
        for (dim, key) in [
            (build_dim_date(&raw).unwrap(), "date_key"),
            (build_dim_product(&raw).unwrap(), "product_code"),
            (build_dim_customer(&raw).unwrap(), "customer_name"),
            (build_dim_order(&raw).unwrap(), "order_number"),
        ] {
            let keys: Vec<_> = dim.column_values(key).unwrap().map(Cell::key).collect();
            let unique: HashSet<_> = keys.iter().collect();
            assert_eq!(keys.len(), unique.len(), "duplicate keys in {}", dim.name());
        }
    }

    #[test]
    fn test_builders_are_idempotent() {
        let raw = sample_raw();
        let before = raw.clone();

        assert_eq!(build_dim_date(&raw).unwrap(), build_dim_date(&raw).unwrap());
        assert_eq!(build_dim_product(&raw).unwrap(), build_dim_product(&raw).unwrap());
        assert_eq!(build_dim_customer(&raw).unwrap(), build_dim_customer(&raw).unwrap());
        assert_eq!(build_dim_order(&raw).unwrap(), build_dim_order(&raw).unwrap());
        assert_eq!(raw, before);
    }
}
