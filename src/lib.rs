//! Server-side lazy grid browsing over Polars LazyFrames.
//!
//! A [`GridSession`] turns grid-widget filter, sort and scroll events into
//! lazy queries and materialises one page at a time. The LazyFrame itself is
//! held in a [`FrameRegistry`] keyed by session id so that the session state
//! stays plain serializable data.

pub mod cache;
pub mod codegen;
pub mod columns;
pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod protocol;
pub mod query;
pub mod scan;
pub mod session;
#[cfg(feature = "bio")]
pub mod vcf;

pub use cache::{FrameCacheEntry, FrameRegistry};
pub use config::{AppConfig, ConfigManager};
pub use error::ScanError;
pub use lazygrid_cli::{Args, FileFormat};
pub use merge::merge_filter_model;
pub use model::{
    ColumnDef, FilterItem, FilterModel, GridType, LogicOperator, PaginationModel, Preset,
    SortDirection, SortItem, SortModel,
};
pub use query::ROW_ID_FIELD;
pub use scan::{scan, scan_with, ScanOptions};
pub use session::{GridEvent, GridOptions, GridSession, GridState};

/// Application name used for the config directory and log env var prefix
pub const APP_NAME: &str = "lazygrid";
