//! nexus2srs-io: HDF5 access and file output for nexus2srs.
//!
//! Opens NeXus files through the HDF5 library, writes SRS `.dat` files and detector
//! frames as TIFF, and drives single-file and directory conversions.

pub mod convert;
mod error;
pub mod hdf5;
pub mod srs;
pub mod sync;
pub mod tiff;

pub use convert::{classify_file, nxs2dat, resolve_destination, ConversionSummary, ConvertOptions};
pub use error::{Error, Result, Stage};
pub use hdf5::{open_indexed, NexusFile};
pub use srs::{header_block, render_srs, write_srs, SrsFormat};
pub use sync::{convert_many, list_nexus_files, sync_directory, SyncOptions, SyncReport};
pub use tiff::{write_tiff, TiffImageSink};

#[cfg(test)]
pub(crate) mod testing {
    use crate::{Error, Result};
    use ::hdf5::types::VarLenUnicode;
    use ::hdf5::{Group, Location};
    use ndarray::ArrayView1;
    use std::str::FromStr;

    fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
        VarLenUnicode::from_str(value)
            .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 string: {e}")))
    }

    pub fn write_f64(group: &Group, name: &str, values: &[f64]) -> Result<()> {
        group
            .new_dataset::<f64>()
            .shape((values.len(),))
            .create(name)?
            .write(ArrayView1::from(values))?;
        Ok(())
    }

    pub fn write_strings(group: &Group, name: &str, values: &[&str]) -> Result<()> {
        let values: Vec<VarLenUnicode> = values
            .iter()
            .map(|value| to_var_len_unicode(value))
            .collect::<Result<Vec<_>>>()?;
        group
            .new_dataset::<VarLenUnicode>()
            .shape((values.len(),))
            .create(name)?
            .write(ArrayView1::from(values.as_slice()))?;
        Ok(())
    }

    pub fn write_str_attr(location: &Location, name: &str, value: &str) -> Result<()> {
        location
            .new_attr::<VarLenUnicode>()
            .create(name)?
            .write_scalar(&to_var_len_unicode(value)?)?;
        Ok(())
    }
}
