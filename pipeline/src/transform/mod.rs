//! Transformation module.
//!
//! This module reshapes the raw sales records into a star schema:
//! - Dates: date parsing and surrogate date keys
//! - Dimensions: date, product, customer and order dimensions
//! - Fact: the sales fact table
//! - Pipeline: load, build, save and upload orchestration

pub mod dates;
pub mod dimensions;
pub mod fact;
pub mod pipeline;

pub use dates::{parse_date, quarter, DateKey};
pub use dimensions::{
    build_dim_customer, build_dim_date, build_dim_order, build_dim_product, select_distinct,
    DimensionSpec, DIM_CUSTOMER, DIM_DATE, DIM_ORDER, DIM_PRODUCT,
};
pub use fact::{build_fact_sales, FACT_SALES};
pub use pipeline::*;
