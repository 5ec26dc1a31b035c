//! Well-known dataset names, container aliases and attribute names.
//!
//! Instruments and acquisition eras nest the same information at different
//! locations, so everything is looked up by name through these tables. A new
//! convention is supported by adding a row, not by changing the resolvers.

/// What a well-known dataset contributes to the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Ordered list of scan column names.
    ScanFields,
    /// Free-text command that started the scan.
    ScanCommand,
    /// ISO-8601 start timestamp.
    StartTime,
    /// Pre-rendered SRS header lines.
    ScanHeader,
    /// Run number.
    ScanNumber,
    /// Paths of image files written during acquisition.
    ImagePaths,
}

/// Dataset leaf names and the role each one plays.
pub const WELL_KNOWN_DATASETS: &[(&str, Role)] = &[
    ("scan_fields", Role::ScanFields),
    ("scan_command", Role::ScanCommand),
    ("start_time", Role::StartTime),
    ("scan_header", Role::ScanHeader),
    ("entry_identifier", Role::ScanNumber),
    ("image_data", Role::ImagePaths),
];

/// Group names whose direct children are the scan columns.
pub const MEASUREMENT_CONTAINERS: &[&str] = &["measurement"];

/// Dataset attributes carrying the acquisition-side name of a field.
pub const FIELD_NAME_ATTRIBUTES: &[&str] = &["gda_field_name", "local_name"];

/// Attribute naming the NeXus base class of a group.
pub const NX_CLASS_ATTRIBUTE: &str = "NX_class";

/// NeXus classes of groups holding area-detector data.
pub const DETECTOR_CLASSES: &[&str] = &["NXdetector"];

/// Dataset names holding the image stack inside a detector group.
pub const DETECTOR_DATA_FIELDS: &[&str] = &["data"];

/// Attribute and value marking a 2-D dataset as a single image.
pub const IMAGE_INTERPRETATION: (&str, &str) = ("interpretation", "image");

/// File-name pattern for externalised images, numbered per scan point.
pub const DEFAULT_IMAGE_TEMPLATE: &str = "%05d.tif";

/// Suffix of the metadata entry describing a detector's image files.
pub const PATH_TEMPLATE_SUFFIX: &str = "_path_template";

/// Detector name used when none can be derived from an image path.
pub const FALLBACK_DETECTOR_NAME: &str = "detector";

/// Dataset names registered for `role`, in priority order.
pub fn names_for(role: Role) -> impl Iterator<Item = &'static str> {
    WELL_KNOWN_DATASETS
        .iter()
        .filter(move |(_, r)| *r == role)
        .map(|(name, _)| *name)
}

/// Role of a dataset leaf name, if it is well known.
#[must_use]
pub fn role_of(name: &str) -> Option<Role> {
    WELL_KNOWN_DATASETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, role)| *role)
}

/// Metadata key for a detector's image path template.
#[must_use]
pub fn path_template_key(detector: &str) -> String {
    format!("{detector}{PATH_TEMPLATE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_a_name() {
        for role in [
            Role::ScanFields,
            Role::ScanCommand,
            Role::StartTime,
            Role::ScanHeader,
            Role::ScanNumber,
            Role::ImagePaths,
        ] {
            assert!(names_for(role).next().is_some(), "{role:?} has no name");
        }
    }

    #[test]
    fn test_role_lookup() {
        assert_eq!(role_of("scan_fields"), Some(Role::ScanFields));
        assert_eq!(role_of("eta"), None);
        assert_eq!(path_template_key("pil3_100k"), "pil3_100k_path_template");
    }
}
