use figment::{
    providers::{Format, Toml},
    Figment,
};

use mzspot::{AcquisitionType, IonMode};
use mzspotter::{ArgIonMode, MZSpotter, TimeRange};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_negative_swath() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("tests/data/negative_swath.toml"));
    let driver: MZSpotter = config.extract().unwrap();

    assert_eq!(driver.input_files.len(), 1);
    assert_eq!(driver.threads, 2);
    assert!(driver.compress);
    assert_eq!(driver.ion_mode, Some(ArgIonMode::Negative));
    assert_eq!(driver.time_range, Some(TimeRange::new(1.5, 20.0)));
    assert_eq!(driver.parameters.acquisition_type, AcquisitionType::SWATH);
    assert_eq!(driver.parameters.peak_pick.minimum_amplitude, 5000.0);
    assert_eq!(driver.parameters.character.searched_adducts.len(), 3);

    let params = driver.resolve_parameters().unwrap();
    assert_eq!(params.ion_mode, IonMode::Negative);
    assert_eq!(params.peak_pick.mass_slice_width, 0.05);
    assert_eq!(params.peak_pick.retention_time_begin, 1.5);
    assert_eq!(params.peak_pick.retention_time_end, 20.0);
    assert_eq!(params.alignment.retention_time_tolerance, 0.2);
    // Unset groups keep their defaults
    assert_eq!(params.isotope, mzspot::IsotopeParameters::default());
}

#[test_log::test]
fn test_missing_input_fails() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("tests/data/negative_swath.toml"));
    let mut driver: MZSpotter = config.extract().unwrap();
    let dir = tempfile::tempdir().unwrap();
    driver.output_directory = dir.path().to_path_buf();
    let err = driver.main().unwrap_err();
    assert!(matches!(err, mzspotter::MZSpotterError::LoadFailed { .. }));
}
