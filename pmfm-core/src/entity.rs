use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::measurement::MeasurementValues;

/// Contract of any record edited through a measurement form.
///
/// The form never assumes anything beyond the measurement map, an optional
/// program label, and a plain-object round trip.
pub trait MeasurementEntity: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Acquisition level used to select the entity's parameters, if fixed.
    const ACQUISITION_LEVEL: Option<&'static str> = None;

    fn measurement_values(&self) -> &MeasurementValues;

    fn set_measurement_values(&mut self, values: MeasurementValues);

    fn program_label(&self) -> Option<&str> {
        None
    }

    fn as_object(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_object(value: serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }
}
