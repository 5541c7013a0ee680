//! Runs every contract scenario against the mock Reis API.

mod common;

use common::MockApi;
use ruter_contract_tests::{
    PlacesFixture, Scenario, TESTING_LOCATION, check_get_departures, check_get_heartbeat,
    check_get_lines_by_stop_id, check_get_lines_stops_and_data, check_get_next_departure,
    check_get_places, check_get_stop, check_get_stops_ruter, check_get_validities,
    check_set_location, run_all,
};

#[test]
fn client_contract_tests_set_location_reads_back_input() {
    let api = MockApi::with_default_routes();
    let ruter = api.client();

    check_set_location(&ruter).expect("location should read back");
    assert_eq!(ruter.location().as_deref(), Some(TESTING_LOCATION));
    assert_eq!(api.total_hits(), 0);
}

#[test]
fn client_contract_tests_validities_and_heartbeat() {
    let ruter = MockApi::with_default_routes().client();

    check_get_validities(&ruter).expect("validities should conform");
    check_get_heartbeat(&ruter).expect("heartbeat should conform");
}

#[test]
fn client_contract_tests_place_scenarios() {
    let ruter = MockApi::with_default_routes().client();
    let places = PlacesFixture::for_testing_place();

    check_get_places(&ruter, &places).expect("places should conform");
    check_get_stop(&ruter, &places).expect("stop lookup should agree with search");
    check_get_lines_by_stop_id(&ruter, &places).expect("lines should match search");
}

#[test]
fn client_contract_tests_stop_and_line_listings() {
    let api = MockApi::with_default_routes();
    let ruter = api.client();

    check_get_stops_ruter(&ruter).expect("stop list should conform");
    check_get_lines_stops_and_data(&ruter).expect("line matrix should conform");

    assert_eq!(api.hits("Line/GetLinesRuter/Extended"), 1);
    assert_eq!(api.hits("Line/GetLinesRuter"), 1);
    assert_eq!(api.hits("Line/GetLines/Extended"), 1);
    assert_eq!(api.hits("Line/GetLines"), 1);
    assert_eq!(api.hits("Line/GetDataByLineID/1"), 4);
}

#[test]
fn client_contract_tests_departure_scenarios() {
    let ruter = MockApi::with_default_routes().client();
    let places = PlacesFixture::for_testing_place();

    check_get_departures(&ruter, &places).expect("departures should conform");
    check_get_next_departure(&ruter, &places).expect("next departure should be earliest");
}

#[test]
fn client_contract_tests_run_all_passes_and_fetches_places_once() {
    let api = MockApi::with_default_routes();
    let ruter = api.client();
    let places = PlacesFixture::for_testing_place();

    let reports = run_all(&ruter, &places);

    assert_eq!(reports.len(), Scenario::ALL.len());
    for report in &reports {
        assert!(
            report.passed(),
            "{} failed: {:?}",
            report.scenario,
            report.outcome
        );
    }
    assert!(places.is_loaded());
    assert_eq!(api.hits("Place/GetPlaces/Majorstuen"), 1);
}

#[test]
fn client_contract_tests_shared_fixture_is_fetched_once_across_threads() {
    let api = MockApi::with_default_routes();
    let ruter = api.client();
    let places = PlacesFixture::for_testing_place();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| check_get_places(&ruter, &places).expect("places should conform"));
        }
    });

    assert_eq!(api.hits("Place/GetPlaces/Majorstuen"), 1);
}
