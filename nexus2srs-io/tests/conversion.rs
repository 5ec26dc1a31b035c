mod common;

use common::{linspace, nx_group, write_detector_scan, write_energy_scan, write_f64, write_str_attr};
use hdf5::File;
use nexus2srs_core::ResolverKind;
use nexus2srs_io::{nxs2dat, ConvertOptions, Stage};
use std::fs;
use tempfile::TempDir;

fn data_rows(text: &str) -> Vec<&str> {
    text.split(" &END\n")
        .nth(1)
        .unwrap()
        .lines()
        .skip(1)
        .collect()
}

#[test]
fn test_energy_scan_end_to_end() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("1040323.nxs");
    write_energy_scan(&source, 61);

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert_eq!(summary.destination, dir.path().join("1040323.dat"));
    assert_eq!(summary.record.resolver, Some(ResolverKind::ExplicitFields));
    assert_eq!(summary.record.points, 61);
    assert_eq!(summary.record.columns, vec!["energy", "ic1monitor"]);

    let text = fs::read_to_string(&summary.destination).unwrap();
    assert!(text.starts_with(" &SRS\n SRSRUN=1040323,SRSDAT=20240305,SRSTIM=140211,\n"));
    assert!(text.contains("cmd='scan energy 8 9 0.1 checkbeam'\n"));
    assert!(text.contains("date='Tue Mar 05 14:02:11 2024'\n"));
    assert!(text.contains("temperature=300.5\n"));
    assert!(text.contains("mode='fast'\n"));

    let rows = data_rows(&text);
    assert_eq!(rows.len(), 61);
    assert_eq!(rows[0], "  8.000000\t1000.000000");
    assert!(rows.iter().all(|row| row.split('\t').count() == 2));
}

#[test]
fn test_dangling_link_does_not_block_conversion() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("77.nxs");
    {
        let file = File::create(&source).unwrap();
        let entry = nx_group(&file, "entry1", "NXentry");
        let measurement = nx_group(&entry, "measurement", "NXcollection");
        write_f64(&measurement, "x", &linspace(0.0, 0.5, 5));
        entry.link_soft("/entry1/instrument/missing", "broken").unwrap();
    }

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert_eq!(summary.record.points, 5);
    assert_eq!(summary.record.stats.unresolved, 1);
}

#[test]
fn test_shape_fallback_without_measurement_group() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("12.nxs");
    {
        let file = File::create(&source).unwrap();
        let entry = nx_group(&file, "entry1", "NXentry");
        let sample = nx_group(&entry, "sample", "NXsample");
        write_f64(&sample, "chi", &linspace(0.0, 1.0, 7));
        write_f64(&sample, "phi", &linspace(10.0, 1.0, 7));
        write_f64(&sample, "offsets", &[0.0, 1.0]);
        write_f64(&sample, "mass", &[2.25]);
    }

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert_eq!(summary.record.resolver, Some(ResolverKind::ShapeMajority));
    assert_eq!(summary.record.points, 7);
    assert_eq!(summary.record.columns.len(), 2);
    let text = fs::read_to_string(&summary.destination).unwrap();
    assert!(text.contains("mass=2.25\n"));
}

#[test]
fn test_field_name_attribute_renames_lookup() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("5.nxs");
    {
        let file = File::create(&source).unwrap();
        let entry = nx_group(&file, "entry1", "NXentry");
        common::write_strings(&entry, "scan_fields", &["th"]);
        let sample = nx_group(&entry, "sample", "NXsample");
        write_f64(&sample, "theta", &linspace(0.0, 0.25, 4));
        let theta = sample.dataset("theta").unwrap();
        write_str_attr(&theta, "local_name", "th");
    }

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert_eq!(summary.record.columns, vec!["th"]);
    assert_eq!(summary.record.points, 4);
}

#[test]
fn test_detector_frames_written_as_tiff() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("1040323.nxs");
    write_detector_scan(&source, 50, 4, 6);
    let out = dir.path().join("processed");
    fs::create_dir_all(&out).unwrap();

    let options = ConvertOptions::default().with_images(true);
    let summary = nxs2dat(&source, Some(&out), &options).unwrap();
    assert_eq!(summary.destination, out.join("1040323.dat"));
    assert_eq!(summary.record.detectors, vec!["pil3_100k"]);
    assert_eq!(summary.images.written, 50);
    assert_eq!(summary.images.failed, 0);

    let images = out.join("1040323-pil3_100k-files");
    assert!(images.join("00001.tif").is_file());
    assert!(images.join("00050.tif").is_file());
    assert!(!images.join("00051.tif").exists());
    assert_eq!(fs::read_dir(&images).unwrap().count(), 50);

    let text = fs::read_to_string(&summary.destination).unwrap();
    assert!(text.contains("pil3_100k_path_template='1040323-pil3_100k-files/%05d.tif'\n"));

    let again = nxs2dat(&source, Some(&out), &options).unwrap();
    assert_eq!(again.images.written, 0);
    assert_eq!(again.images.existing, 50);
}

#[test]
fn test_images_are_not_written_by_default() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("9.nxs");
    write_detector_scan(&source, 3, 2, 2);

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert_eq!(summary.images.total(), 0);
    assert!(!dir.path().join("9-pil3_100k-files").exists());
}

#[test]
fn test_unwritable_destination_fails_at_write() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("3.nxs");
    write_energy_scan(&source, 3);
    let destination = dir.path().join("missing/dir/3.dat");

    let err = nxs2dat(&source, Some(&destination), &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Write));
    assert!(err.to_string().contains("3.nxs"));
}

#[test]
fn test_file_without_datasets_is_metadata_only() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("1040400.nxs");
    File::create(&source).unwrap();

    let summary = nxs2dat(&source, None, &ConvertOptions::default()).unwrap();
    assert!(summary.record.resolver.is_none());
    assert_eq!(summary.record.points, 0);
    assert_eq!(summary.record.metadata, 2);
    let text = fs::read_to_string(&summary.destination).unwrap();
    assert!(text.contains("<MetaDataAtStart>\ncmd=''\ndate="));
    assert!(text.ends_with(" &END\n\n"));
}
