//! Sales fact table.
//!
//! One output row per raw record, never deduplicated. The date foreign key
//! comes from a left join against the date dimension on the calendar date;
//! a raw row whose date has no match keeps a null `date_key` instead of
//! being dropped.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::dates::cell_to_date;
use super::dimensions::ORDER_DATE;
use crate::error::{TransformError, TransformResult};
use crate::logs::{log_info, log_warning};
use crate::models::{Cell, Table};

pub const FACT_SALES: &str = "fact_sales";

/// How a raw column is carried into the fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    /// Copied unchanged.
    Keep,
    Float,
    Integer,
}

/// `(source column, output column, conversion)`; `date_key` is inserted after
/// the three business keys.
const FACT_COLUMNS: &[(&str, &str, Measure)] = &[
    ("ORDERNUMBER", "order_number", Measure::Keep),
    ("PRODUCTCODE", "product_code", Measure::Keep),
    ("CUSTOMERNAME", "customer_name", Measure::Keep),
    ("SALES", "sales", Measure::Float),
    ("QUANTITYORDERED", "quantity_ordered", Measure::Integer),
    ("PRICEEACH", "price_each", Measure::Float),
    ("DEALSIZE", "deal_size", Measure::Keep),
    ("ORDERLINENUMBER", "order_line_number", Measure::Integer),
];

const DATE_KEY_POSITION: usize = 3;

/// Build the fact table from the raw records and an already built date dimension.
pub fn build_fact_sales(raw: &Table, dim_date: &Table) -> TransformResult<Table> {
    log_info("Creating Sales Fact Table...");

    let lookup = date_lookup(dim_date)?;
    let date_idx = raw.require_column(ORDER_DATE, FACT_SALES)?;
    let sources = FACT_COLUMNS
        .iter()
        .map(|(source, _, measure)| {
            Ok((*source, raw.require_column(source, FACT_SALES)?, *measure))
        })
        .collect::<TransformResult<Vec<_>>>()?;

    let mut columns: Vec<&str> = FACT_COLUMNS.iter().map(|(_, target, _)| *target).collect();
    columns.insert(DATE_KEY_POSITION, "date_key");
    let mut table = Table::new(FACT_SALES, columns);

    let mut unmatched = 0usize;
    for (row_no, row) in raw.rows().iter().enumerate() {
        let row_no = row_no + 1;

        let date = cell_to_date(&row[date_idx]).map_err(|value| TransformError::DateParse {
            column: ORDER_DATE.to_string(),
            row: row_no,
            value,
        })?;
        let date_key = match date.and_then(|d| lookup.get(&d)) {
            Some(key) => key.clone(),
            None => {
                unmatched += 1;
                Cell::Null
            }
        };

        let mut out = Vec::with_capacity(FACT_COLUMNS.len() + 1);
        for &(source, idx, measure) in &sources {
            let cell = &row[idx];
            out.push(match measure {
                Measure::Keep => cell.clone(),
                Measure::Float => to_float(cell, source, row_no)?,
                Measure::Integer => to_integer(cell, source, row_no)?,
            });
        }
        out.insert(DATE_KEY_POSITION, date_key);
        table.push_row(out);
    }

    if unmatched > 0 {
        log_warning(format!("{} fact rows have no matching date_key", unmatched));
    }
    log_info(format!("Sales Fact Table created. Shape: {:?}", table.shape()));
    Ok(table)
}

/// Calendar date → `date_key` cell, first row wins.
fn date_lookup(dim_date: &Table) -> TransformResult<HashMap<NaiveDate, Cell>> {
    let date_idx = dim_date.require_column("order_date", FACT_SALES)?;
    let key_idx = dim_date.require_column("date_key", FACT_SALES)?;

    let mut lookup = HashMap::with_capacity(dim_date.len());
    for (row_no, row) in dim_date.rows().iter().enumerate() {
        let date = cell_to_date(&row[date_idx]).map_err(|value| TransformError::DateParse {
            column: "order_date".to_string(),
            row: row_no + 1,
            value,
        })?;
        if let Some(date) = date {
            lookup.entry(date).or_insert_with(|| row[key_idx].clone());
        }
    }
    Ok(lookup)
}

fn coercion_error(cell: &Cell, column: &str, row: usize, expected: &'static str) -> TransformError {
    TransformError::TypeCoercion {
        column: column.to_string(),
        row,
        value: cell.to_string(),
        expected,
    }
}

fn to_float(cell: &Cell, column: &str, row: usize) -> TransformResult<Cell> {
    match cell {
        Cell::Null => Ok(Cell::Null),
        Cell::Float(_) => Ok(cell.clone()),
        Cell::Int(v) => Ok(Cell::Float(*v as f64)),
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Cell::Float)
            .map_err(|_| coercion_error(cell, column, row, "a float")),
        Cell::Date(_) => Err(coercion_error(cell, column, row, "a float")),
    }
}

fn to_integer(cell: &Cell, column: &str, row: usize) -> TransformResult<Cell> {
    // i64::MAX is not representable as f64, so the upper bound is exclusive
    const MIN: f64 = -9.223_372_036_854_775_808e18;
    const MAX: f64 = 9.223_372_036_854_775_808e18;
    let whole = |v: f64| (v.fract() == 0.0 && (MIN..MAX).contains(&v)).then_some(v as i64);

    match cell {
        Cell::Null => Ok(Cell::Null),
        Cell::Int(_) => Ok(cell.clone()),
        Cell::Float(v) if v.is_nan() => Ok(Cell::Null),
        Cell::Float(v) => whole(*v)
            .map(Cell::Int)
            .ok_or_else(|| coercion_error(cell, column, row, "an integer")),
        Cell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
                .map(Cell::Int)
                .ok_or_else(|| coercion_error(cell, column, row, "an integer"))
        }
        Cell::Date(_) => Err(coercion_error(cell, column, row, "an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellKey;
    use crate::transform::dimensions::{
        build_dim_customer, build_dim_date, build_dim_order, build_dim_product,
    };
    use crate::transform::test_support::{raw_table, sample_raw};
    use std::collections::HashSet;

    const HEADERS: &[&str] = &[
        "ORDERNUMBER",
        "QUANTITYORDERED",
        "PRICEEACH",
        "ORDERLINENUMBER",
        "SALES",
        "ORDERDATE",
        "PRODUCTCODE",
        "CUSTOMERNAME",
        "DEALSIZE",
    ];

    /// One raw row with the given quantity and sales values.
    fn line<'a>(order: &'a str, quantity: &'a str, sales: &'a str, date: &'a str) -> [&'a str; 9] {
        [order, quantity, "3.0", "1", sales, date, "P1", "C1", "Small"]
    }

    #[test]
    fn test_fact_example_row() {
        let raw = raw_table(
            HEADERS,
            &[&[
                "10107",
                "2",
                "50.0",
                "1",
                "100.0",
                "2024-01-15",
                "P1",
                "Land of Toys Inc.",
                "Small",
            ]],
        );
        let dim_date = build_dim_date(&raw).unwrap();
        let fact = build_fact_sales(&raw, &dim_date).unwrap();

        assert_eq!(
            fact.columns(),
            &[
                "order_number",
                "product_code",
                "customer_name",
                "date_key",
                "sales",
                "quantity_ordered",
                "price_each",
                "deal_size",
                "order_line_number",
            ]
        );
        assert_eq!(fact.get(0, "date_key"), Some(&Cell::Int(20240115)));
        assert_eq!(fact.get(0, "sales"), Some(&Cell::Float(100.0)));
        assert_eq!(fact.get(0, "quantity_ordered"), Some(&Cell::Int(2)));
        assert_eq!(fact.get(0, "order_line_number"), Some(&Cell::Int(1)));
    }

    #[test]
    fn test_fact_keeps_every_raw_row() {
        let raw = sample_raw();
        let fact = build_fact_sales(&raw, &build_dim_date(&raw).unwrap()).unwrap();
        assert_eq!(fact.len(), raw.len());
    }

    #[test]
    fn test_unmatched_date_gets_null_key() {
        let raw = raw_table(
            HEADERS,
            &[
                &line("1", "2", "6.0", "2024-01-15"),
                &line("2", "2", "6.0", "2024-01-16"),
            ],
        );
        let partial = raw_table(&["ORDERDATE"], &[&["2024-01-15"]]);
        let dim_date = build_dim_date(&partial).unwrap();

        let fact = build_fact_sales(&raw, &dim_date).unwrap();
        assert_eq!(fact.len(), 2);
        assert_eq!(fact.get(0, "date_key"), Some(&Cell::Int(20240115)));
        assert_eq!(fact.get(1, "date_key"), Some(&Cell::Null));
    }

    #[test]
    fn test_non_numeric_sales_fails() {
        let raw = raw_table(
            HEADERS,
            &[
                &line("1", "2", "6.0", "2024-01-15"),
                &line("2", "2", "n/a", "2024-01-15"),
            ],
        );
        let dim_date = build_dim_date(&raw).unwrap();

        match build_fact_sales(&raw, &dim_date) {
            Err(TransformError::TypeCoercion { column, row, value, .. }) => {
                assert_eq!(column, "SALES");
                assert_eq!(row, 2);
                assert_eq!(value, "n/a");
            }
            other => panic!("expected TypeCoercion, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_quantity_fails() {
        let raw = raw_table(
            HEADERS,
            &[
                &line("1", "2", "6.0", "2024-01-15"),
                &line("2", "1e30", "6.0", "2024-01-15"),
            ],
        );
        let dim_date = build_dim_date(&raw).unwrap();

        match build_fact_sales(&raw, &dim_date) {
            Err(TransformError::TypeCoercion { column, row, value, .. }) => {
                assert_eq!(column, "QUANTITYORDERED");
                assert_eq!(row, 2);
                assert!(value.starts_with("1000000000000000000000000000000"));
            }
            other => panic!("expected TypeCoercion, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(
            to_integer(&Cell::Float(-9.223_372_036_854_775_808e18), "Q", 1).unwrap(),
            Cell::Int(i64::MIN)
        );
        assert!(to_integer(&Cell::Float(9.223_372_036_854_775_808e18), "Q", 1).is_err());
        assert!(to_integer(&Cell::Float(f64::INFINITY), "Q", 1).is_err());
        assert!(to_integer(&Cell::Text("-1e19".into()), "Q", 1).is_err());
    }

    #[test]
    fn test_fractional_quantity_fails() {
        let err = to_integer(&Cell::Float(2.5), "QUANTITYORDERED", 7).unwrap_err();
        assert!(err.to_string().contains("QUANTITYORDERED"));
        assert_eq!(to_integer(&Cell::Text("3.0".into()), "Q", 1).unwrap(), Cell::Int(3));
        assert_eq!(to_float(&Cell::Int(4), "S", 1).unwrap(), Cell::Float(4.0));
    }

    #[test]
    fn test_date_dimension_without_order_date_column() {
        let raw = sample_raw();
        let bad = raw_table(&["date_key"], &[&["20240115"]]);
        match build_fact_sales(&raw, &bad) {
            Err(TransformError::MissingColumn { column, .. }) => assert_eq!(column, "order_date"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_referential_integrity() {
        let raw = sample_raw();
        let dim_date = build_dim_date(&raw).unwrap();
        let fact = build_fact_sales(&raw, &dim_date).unwrap();

        let checks = [
            ("date_key", dim_date.clone()),
            ("product_code", build_dim_product(&raw).unwrap()),
            ("customer_name", build_dim_customer(&raw).unwrap()),
            ("order_number", build_dim_order(&raw).unwrap()),
        ];
        for (column, dim) in &checks {
            let known: HashSet<CellKey<'_>> =
                dim.column_values(column).unwrap().map(Cell::key).collect();
            for cell in fact.column_values(column).unwrap().filter(|c| !c.is_null()) {
                assert!(
                    known.contains(&cell.key()),
                    "{} {:?} missing from {}",
                    column,
                    cell,
                    dim.name()
                );
            }
        }
    }
}
