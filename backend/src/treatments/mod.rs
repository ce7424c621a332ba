pub mod catalog;

pub use catalog::{CatalogError, Treatment, TreatmentCatalog, NO_TREATMENT_TEXT};
