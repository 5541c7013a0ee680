//! Integration tests for validate-then-decode helpers.

use ruter_core::{Line, Place, Stop, Validities};
use ruter_schema::{
    LINE_SCHEMA, STOP_SCHEMA, SchemaError, VALIDITIES_SCHEMA, decode_departures, decode_place,
    decode_places, decode_record, decode_records,
};
use serde_json::{Value, json};

fn fixture(name: &str) -> Value {
    let path = format!(
        "{}/../../contracts/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    );
    let raw = std::fs::read_to_string(path).expect("fixture should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

#[test]
fn checked_decoding_tests_decodes_place_fixture() {
    let places = decode_places(fixture("places-majorstuen.json")).expect("places should decode");

    assert_eq!(places.len(), 2);
    assert!(matches!(places[0], Place::Area(_)));
    let stop = places[1].as_stop().expect("second place is a stop");
    assert_eq!(stop.short_name, "MAJ");
    assert!(stop.has_lines());
}

#[test]
fn checked_decoding_tests_rejects_area_without_stops() {
    let error = decode_place(json!({"PlaceType": "POI", "Name": "Colosseum kino"}))
        .expect_err("area without stops should fail");
    assert!(matches!(
        error,
        SchemaError::MissingField {
            field: "Stops",
            ..
        }
    ));
}

#[test]
fn checked_decoding_tests_rejects_bad_nested_stop() {
    let error = decode_place(json!({
        "PlaceType": "Area",
        "Stops": [{"ID": "3010200"}]
    }))
    .expect_err("nested stop with text id should fail");
    assert!(matches!(error, SchemaError::AtIndex { index: 0, .. }));
}

#[test]
fn checked_decoding_tests_validates_embedded_journey() {
    let mut departures = fixture("departures-3010200.json");
    departures[1]["MonitoredVehicleJourney"]["VehicleMode"] = json!("metro");

    let error = decode_departures(departures).expect_err("text vehicle mode should fail");
    assert!(matches!(
        error.root(),
        SchemaError::WrongKind {
            record: "Journey",
            field: "VehicleMode",
            ..
        }
    ));
}

#[test]
fn checked_decoding_tests_decodes_typed_lists() {
    let lines: Vec<Line> =
        decode_records(fixture("lines.json"), &LINE_SCHEMA).expect("lines should decode");
    assert_eq!(lines[0].id, 1);

    let stop: Stop =
        decode_record(fixture("stop-3010200.json"), &STOP_SCHEMA).expect("stop should decode");
    assert_eq!(stop.district_id.as_deref(), Some("0301"));
}

#[test]
fn checked_decoding_tests_rejects_object_for_list() {
    let error = decode_records::<Line>(fixture("line-1.json"), &LINE_SCHEMA)
        .expect_err("object is not a line list");
    assert!(matches!(error, SchemaError::NotASequence { .. }));
}

#[test]
fn checked_decoding_tests_validities_accept_null_bound() {
    let validities: Validities = decode_record(
        json!({"ValidFrom": "2017-01-01T00:00:00+01:00", "ValidTo": null}),
        &VALIDITIES_SCHEMA,
    )
    .expect("null upper bound is allowed");
    assert_eq!(validities.valid_from.as_deref(), Some("2017-01-01T00:00:00+01:00"));
    assert_eq!(validities.valid_to, None);

    let error = decode_record::<Validities>(json!({"ValidFrom": null}), &VALIDITIES_SCHEMA)
        .expect_err("missing bound should fail");
    assert!(matches!(
        error,
        SchemaError::MissingField {
            field: "ValidTo",
            ..
        }
    ));
}
