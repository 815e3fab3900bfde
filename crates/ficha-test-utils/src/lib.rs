//! Testing utilities for the ficha workspace
//!
//! Shared test helpers, fixtures, and proptest strategies.

#![allow(missing_docs)]

use ficha_model::{
    FichaId, FichaSection, FichaState, FichaStatus, FieldValue, SectionKind,
};
use proptest::prelude::*;

/// A ficha with one filled identification section; passes default validation
pub fn valid_ficha(id: &str) -> FichaState {
    FichaState::base(&FichaId::new(id))
        .with_pozo_id(format!("PZ-{id}"))
        .with_section(identification_section(true))
}

/// A ficha with every required field filled, photos and coordinates
/// present, and five sections; passes strict validation
pub fn complete_ficha(id: &str) -> FichaState {
    FichaState::base(&FichaId::new(id))
        .with_pozo_id(format!("PZ-{id}"))
        .with_section(
            identification_section(true)
                .with_field("coordinateX", FieldValue::excel("1000.5"))
                .with_field("coordinateY", FieldValue::excel("2000.25")),
        )
        .with_section(
            FichaSection::new("location", SectionKind::Location)
                .with_field("address", FieldValue::excel("Calle 10 # 5-20"))
                .with_field("neighborhood", FieldValue::excel("Centro")),
        )
        .with_section(
            FichaSection::new("components", SectionKind::Components)
                .with_field("hasCover", FieldValue::excel("Yes"))
                .with_field("hasCylinder", FieldValue::excel("Yes")),
        )
        .with_section(
            FichaSection::new("pipes", SectionKind::Pipes)
                .with_field("inletDiameter", FieldValue::excel("12")),
        )
        .with_section(
            FichaSection::new("photos", SectionKind::Photos)
                .with_field("images", FieldValue::excel("PZ-001-P.jpg")),
        )
}

/// Identification section, optionally with every required field filled
pub fn identification_section(filled: bool) -> FichaSection {
    let value = |v: &str| FieldValue::excel(if filled { v } else { "" });
    FichaSection::new("identification", SectionKind::Identification)
        .with_field("pozoId", value("PZ-001"))
        .with_field("inspectionDate", value("2024-01-15"))
        .with_field("surveyor", value("J. Perez"))
        .with_field("condition", value("Good"))
}

/// A ficha with sections whose fields are all blank
pub fn empty_fields_ficha(id: &str) -> FichaState {
    FichaState::base(&FichaId::new(id)).with_section(identification_section(false))
}

/// A valid ficha serialized to JSON
pub fn valid_ficha_json(id: &str) -> serde_json::Value {
    serde_json::to_value(valid_ficha(id)).unwrap()
}

/// Strategy over ficha statuses
pub fn arb_status() -> impl Strategy<Value = FichaStatus> {
    prop_oneof![
        Just(FichaStatus::Draft),
        Just(FichaStatus::Editing),
        Just(FichaStatus::Complete),
        Just(FichaStatus::Finalized),
    ]
}

/// Strategy over short ficha ids
pub fn arb_ficha_id() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}
