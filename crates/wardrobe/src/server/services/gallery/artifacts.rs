//! On-disk representation of a gallery
//!
//! Two files live side by side in the data directory:
//!
//! - the embedding matrix: magic `WRDG`, format version, row count (u64 LE),
//!   dimension (u32 LE), BLAKE3 digest of the identifier file, `rows * dim`
//!   little-endian f32 values in row-major order, and a trailing BLAKE3
//!   checksum of everything before it
//! - the identifier list: one identifier per line, line `i` naming row `i`
//!
//! Each file is written to a temporary sibling and renamed into place. The
//! identifier digest in the matrix header ties the pair together, so a pair
//! where only one file was replaced is rejected on read.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Gallery;
use crate::config::CachePaths;
use crate::error::{RecommendError, RecommendResult};

const MAGIC: [u8; 4] = *b"WRDG";
const FORMAT_VERSION: u8 = 1;
const DIGEST_LEN: usize = 32;
// magic + version + rows + dim + identifier digest
const HEADER_LEN: usize = 4 + 1 + 8 + 4 + DIGEST_LEN;

/// Persist both artifacts for `gallery`, creating the data directory if needed
pub fn write_pair(gallery: &Gallery, paths: &CachePaths) -> RecommendResult<()> {
  fs::create_dir_all(paths.dir())?;

  let identifier_bytes = encode_identifiers(gallery.identifiers())?;
  let matrix_bytes = encode_matrix(gallery, blake3::hash(&identifier_bytes).as_bytes());

  write_atomically(&paths.identifiers, &identifier_bytes)?;
  write_atomically(&paths.embeddings, &matrix_bytes)?;
  Ok(())
}

/// Load both artifacts and check that they describe the same gallery
pub fn read_pair(paths: &CachePaths) -> RecommendResult<Gallery> {
  let matrix_bytes = fs::read(&paths.embeddings)?;
  let identifier_bytes = fs::read(&paths.identifiers)?;

  let header = decode_header(&matrix_bytes)?;
  if blake3::hash(&identifier_bytes).as_bytes() != &header.identifier_digest {
    return Err(RecommendError::gallery_inconsistent(
      "identifier list was not written together with the embedding matrix",
    ));
  }

  let identifiers = decode_identifiers(&identifier_bytes)?;
  if identifiers.len() != header.rows {
    return Err(RecommendError::gallery_inconsistent(format!(
      "{} embedding rows but {} identifiers",
      header.rows,
      identifiers.len()
    )));
  }

  let payload = &matrix_bytes[HEADER_LEN..matrix_bytes.len() - DIGEST_LEN];
  let matrix = payload
    .chunks_exact(4)
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect();

  Gallery::new(identifiers, matrix, header.dimension)
}

struct MatrixHeader {
  rows: usize,
  dimension: usize,
  identifier_digest: [u8; DIGEST_LEN],
}

fn encode_matrix(gallery: &Gallery, identifier_digest: &[u8; DIGEST_LEN]) -> Vec<u8> {
  let mut data = Vec::with_capacity(HEADER_LEN + gallery.matrix().len() * 4 + DIGEST_LEN);

  data.extend_from_slice(&MAGIC);
  data.push(FORMAT_VERSION);
  data.extend_from_slice(&(gallery.len() as u64).to_le_bytes());
  data.extend_from_slice(&(gallery.dimension() as u32).to_le_bytes());
  data.extend_from_slice(identifier_digest);
  for value in gallery.matrix() {
    data.extend_from_slice(&value.to_le_bytes());
  }

  let checksum = blake3::hash(&data);
  data.extend_from_slice(checksum.as_bytes());
  data
}

fn decode_header(data: &[u8]) -> RecommendResult<MatrixHeader> {
  if data.len() < HEADER_LEN + DIGEST_LEN {
    return Err(RecommendError::gallery_inconsistent("embedding matrix file is truncated"));
  }

  let checksum_offset = data.len() - DIGEST_LEN;
  if blake3::hash(&data[..checksum_offset]).as_bytes() != &data[checksum_offset..] {
    return Err(RecommendError::gallery_inconsistent("embedding matrix checksum mismatch"));
  }
  if data[0..4] != MAGIC {
    return Err(RecommendError::gallery_inconsistent("embedding matrix has an unknown format"));
  }
  if data[4] != FORMAT_VERSION {
    return Err(RecommendError::gallery_inconsistent(format!(
      "embedding matrix format version {} is not supported (expected {FORMAT_VERSION})",
      data[4]
    )));
  }

  let rows = u64::from_le_bytes(fixed(&data[5..13]));
  let dimension = u32::from_le_bytes(fixed(&data[13..17])) as usize;
  let identifier_digest: [u8; DIGEST_LEN] = fixed(&data[17..HEADER_LEN]);

  let payload_len = checksum_offset - HEADER_LEN;
  let expected_len = usize::try_from(rows)
    .ok()
    .and_then(|rows| rows.checked_mul(dimension))
    .and_then(|values| values.checked_mul(4));
  if expected_len != Some(payload_len) {
    return Err(RecommendError::gallery_inconsistent(format!(
      "header declares {rows} rows of {dimension} values but the payload holds {payload_len} bytes"
    )));
  }

  Ok(MatrixHeader { rows: rows as usize, dimension, identifier_digest })
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
  let mut out = [0u8; N];
  out.copy_from_slice(bytes);
  out
}

fn encode_identifiers(identifiers: &[String]) -> RecommendResult<Vec<u8>> {
  let mut data = Vec::new();
  for identifier in identifiers {
    check_identifier(identifier)?;
    data.extend_from_slice(identifier.as_bytes());
    data.push(b'\n');
  }
  Ok(data)
}

/// Reject identifiers that would break the line-delimited list
pub(crate) fn check_identifier(identifier: &str) -> RecommendResult<()> {
  if identifier.contains(['\n', '\r']) {
    return Err(RecommendError::InvalidIdentifier { identifier: identifier.to_string() });
  }
  Ok(())
}

fn decode_identifiers(data: &[u8]) -> RecommendResult<Vec<String>> {
  let text = std::str::from_utf8(data)
    .map_err(|e| RecommendError::gallery_inconsistent(format!("identifier list is not UTF-8: {e}")))?;

  if text.is_empty() {
    return Ok(Vec::new());
  }
  let Some(body) = text.strip_suffix('\n') else {
    return Err(RecommendError::gallery_inconsistent("identifier list ends mid-line"));
  };

  Ok(body.split('\n').map(str::to_string).collect())
}

fn write_atomically(path: &Path, data: &[u8]) -> RecommendResult<()> {
  let temp_path = temp_sibling(path);
  {
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
  }
  fs::rename(&temp_path, path)?;
  Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}
