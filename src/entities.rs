//! Entities edited through measurement forms
//!
//! Each one carries a program reference and a measurement map, and selects
//! its parameters through a fixed acquisition level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pmfm_core::catalog::acquisition_level;
use pmfm_core::{MeasurementEntity, MeasurementValues};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRef {
    #[serde(default)]
    pub id: Option<i32>,
    pub label: String,
}

impl ProgramRef {
    pub fn new(label: &str) -> Self {
        Self {
            id: None,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sample {
    pub id: Option<i32>,
    pub label: Option<String>,
    pub rank_order: Option<i32>,
    pub sample_date: Option<DateTime<Utc>>,
    pub taxon_name: Option<String>,
    pub program: Option<ProgramRef>,
    pub comments: Option<String>,
    pub measurement_values: MeasurementValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Landing {
    pub id: Option<i32>,
    pub vessel_id: Option<i32>,
    pub date_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub rank_order_on_vessel: Option<i32>,
    pub program: Option<ProgramRef>,
    pub comments: Option<String>,
    pub measurement_values: MeasurementValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservedLocation {
    pub id: Option<i32>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub observers: Vec<String>,
    pub program: Option<ProgramRef>,
    pub comments: Option<String>,
    pub measurement_values: MeasurementValues,
}

macro_rules! measurement_entity {
    ($entity:ty, $level:expr) => {
        impl MeasurementEntity for $entity {
            const ACQUISITION_LEVEL: Option<&'static str> = Some($level);

            fn measurement_values(&self) -> &MeasurementValues {
                &self.measurement_values
            }

            fn set_measurement_values(&mut self, values: MeasurementValues) {
                self.measurement_values = values;
            }

            fn program_label(&self) -> Option<&str> {
                self.program.as_ref().map(|p| p.label.as_str())
            }
        }
    };
}

measurement_entity!(Sample, acquisition_level::SAMPLE);
measurement_entity!(Landing, acquisition_level::LANDING);
measurement_entity!(ObservedLocation, acquisition_level::OBSERVED_LOCATION);
