//! Builders for small NeXus files used by the integration tests.
#![allow(dead_code)]

use hdf5::types::VarLenUnicode;
use hdf5::{File, Group, Location};
use ndarray::{Array3, ArrayView1};
use std::path::Path;
use std::str::FromStr;

pub fn linspace(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * f64::from(u32::try_from(i).unwrap())).collect()
}

fn unicode(value: &str) -> VarLenUnicode {
    VarLenUnicode::from_str(value).unwrap()
}

pub fn write_f64(group: &Group, name: &str, values: &[f64]) {
    group
        .new_dataset::<f64>()
        .shape((values.len(),))
        .create(name)
        .unwrap()
        .write(ArrayView1::from(values))
        .unwrap();
}

pub fn write_strings(group: &Group, name: &str, values: &[&str]) {
    let values: Vec<VarLenUnicode> = values.iter().map(|v| unicode(v)).collect();
    group
        .new_dataset::<VarLenUnicode>()
        .shape((values.len(),))
        .create(name)
        .unwrap()
        .write(ArrayView1::from(values.as_slice()))
        .unwrap();
}

pub fn write_str_attr(location: &Location, name: &str, value: &str) {
    location
        .new_attr::<VarLenUnicode>()
        .create(name)
        .unwrap()
        .write_scalar(&unicode(value))
        .unwrap();
}

pub fn nx_group(parent: &Group, name: &str, nx_class: &str) -> Group {
    let group = parent.create_group(name).unwrap();
    write_str_attr(&group, "NX_class", nx_class);
    group
}

/// A 1-D energy scan with `points` points, an explicit field list and two scalars.
pub fn write_energy_scan(path: &Path, points: usize) {
    let file = File::create(path).unwrap();
    let entry = nx_group(&file, "entry1", "NXentry");
    write_strings(&entry, "scan_command", &["scan energy 8 9 0.1 checkbeam"]);
    write_strings(&entry, "start_time", &["2024-03-05T14:02:11+00:00"]);
    write_strings(&entry, "scan_fields", &["energy", "ic1monitor"]);

    let measurement = nx_group(&entry, "measurement", "NXcollection");
    write_f64(&measurement, "energy", &linspace(8.0, 0.1, points));
    write_f64(&measurement, "ic1monitor", &linspace(1000.0, 3.0, points));

    let before = nx_group(&entry, "before_scan", "NXcollection");
    write_f64(&before, "temperature", &[300.5]);
    write_strings(&before, "mode", &["  fast  "]);
}

/// An area-detector scan: `frames` images of `rows` x `cols` stored in the file.
pub fn write_detector_scan(path: &Path, frames: usize, rows: usize, cols: usize) {
    let file = File::create(path).unwrap();
    let entry = nx_group(&file, "entry1", "NXentry");
    write_strings(&entry, "scan_command", &["scan eta 1 50 1 pil3_100k 0.1"]);

    let measurement = nx_group(&entry, "measurement", "NXcollection");
    write_f64(&measurement, "eta", &linspace(1.0, 1.0, frames));

    let instrument = nx_group(&entry, "instrument", "NXinstrument");
    let detector = nx_group(&instrument, "pil3_100k", "NXdetector");
    let counts: Vec<u32> = (0..frames * rows * cols)
        .map(|v| u32::try_from(v % 97).unwrap())
        .collect();
    let stack = Array3::from_shape_vec((frames, rows, cols), counts).unwrap();
    detector
        .new_dataset::<u32>()
        .shape((frames, rows, cols))
        .create("data")
        .unwrap()
        .write(&stack)
        .unwrap();
}
