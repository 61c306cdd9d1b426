//! Rules in the `semantic` namespace.

mod domain;
mod future_leakage;
mod hierarchy;
mod invalid_reason;
mod join_path;
mod maps_to;
mod measurement_unit;
mod observation_period;
mod standard_concept;
mod unmapped;

pub use domain::DomainSegregation;
pub use future_leakage::FutureInformationLeakage;
pub use hierarchy::HierarchyExpansionRequired;
pub use invalid_reason::InvalidReasonEnforcement;
pub use join_path::JoinPathValidation;
pub use maps_to::MapsToDirection;
pub use measurement_unit::MeasurementUnitValidation;
pub use observation_period::ObservationPeriodAnchoring;
pub use standard_concept::StandardConceptEnforcement;
pub use unmapped::UnmappedConceptHandling;
