//! The `.npz` archive format: a zip file of `.npy` entries.

use std::io::{Read, Seek, Write};

use ff_tensor::Tensor;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::npy::{self, NpyElement, NpyHeader};
use crate::Result;

/// Read every array of an archive, in archive entry order.
///
/// Compressed (`numpy.savez_compressed`) and stored archives are both
/// accepted. Directory entries are skipped.
pub fn read_npz<T: NpyElement, R: Read + Seek>(reader: R) -> Result<Vec<Tensor<T>>> {
    Ok(read_npz_named(reader)?
        .into_iter()
        .map(|(_, tensor)| tensor)
        .collect())
}

/// Like [`read_npz`], keeping each entry's name.
pub fn read_npz_named<T: NpyElement, R: Read + Seek>(reader: R) -> Result<Vec<(String, Tensor<T>)>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut tensors = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let tensor = npy::read_npy(&mut entry)?;
        tracing::debug!(entry = entry.name(), shape = %tensor.shape(), "loaded npz entry");
        tensors.push((entry.name().to_string(), tensor));
    }
    Ok(tensors)
}

/// Names and headers of every entry, without reading array data.
pub fn read_npz_headers<R: Read + Seek>(reader: R) -> Result<Vec<(String, NpyHeader)>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut headers = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let header = npy::read_header(&mut entry)?;
        headers.push((entry.name().to_string(), header));
    }
    Ok(headers)
}

/// Write `tensors` as stored (uncompressed) entries `arr_0.npy`,
/// `arr_1.npy`, ... and return the finished writer.
pub fn write_npz<T: NpyElement, W: Write + Seek>(tensors: &[Tensor<T>], writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (i, tensor) in tensors.iter().enumerate() {
        let name = format!("arr_{i}.npy");
        zip.start_file(name.as_str(), options)?;
        npy::write_npy(tensor, &mut zip)?;
        tracing::debug!(entry = %name, shape = %tensor.shape(), "wrote npz entry");
    }
    Ok(zip.finish()?)
}
