//! Slide-record synchronization: content fingerprinting, the tabular
//! record schema, layout resolution, text-edit patches, and the batch
//! rebuild pipeline.

pub mod doc;
pub mod error;
pub mod fingerprint;
pub mod fsutil;
pub mod index;
pub mod layout;
pub mod locator;
pub mod patch;
pub mod record;
pub mod sync;
pub mod validate;

pub use doc::{DeckDocument, DeckLoader, ShapeContent, SlideContent};
pub use error::{Error, Result, Severity};
pub use index::index_deck;
pub use layout::{LayoutKind, LayoutTable, OverflowPolicy, PlaceholderRole, ResolvePolicy};
pub use locator::ImageLocator;
pub use patch::{apply_patches, export_patches, ApplyOptions, ApplyReport, PatchFile};
pub use record::{read_records, write_records, SlideRecord};
pub use sync::{Pipeline, PipelineOptions, RenderPlan, RunSummary, SlideRenderer};
pub use validate::{validate_records, ValidateOptions, ValidationReport};
