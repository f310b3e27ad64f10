//! PMFM Core
//!
//! Pure data model shared by every measurement form: parameter definitions
//! (Parameter / Method / Fraction / Matrix), measurement values in model and
//! form representation, the immutable parameter catalog and the entity
//! contract.

pub mod catalog;
pub mod entity;
pub mod error;
pub mod measurement;
pub mod spec;
pub mod value;

pub use catalog::{
    CatalogQuery, InMemoryCatalog, ParameterCatalog, ParameterCatalogProvider, ParameterList,
    ParameterSource, ParameterStream, PmfmStrategy,
};
pub use entity::MeasurementEntity;
pub use error::CoreError;
pub use measurement::{FormValues, MeasurementValues, ModelValues, ValuesKind};
pub use spec::{ParameterSpec, PmfmId, QualitativeValue, UnitConversion, ValueType};
pub use value::{FormValue, PmfmValue, PMFM_VALUE_SEPARATOR};
