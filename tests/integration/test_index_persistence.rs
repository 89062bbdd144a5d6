//! Persisted index format: what survives a round trip through disk and what
//! gets rejected as corrupt.

use hadith_search::vector::{VectorDimension, VectorError, read_matrix, write_matrix};
use hadith_search::{FlatIndex, Position, VectorIndex};
use tempfile::TempDir;

fn sample_index() -> FlatIndex {
    FlatIndex::build(&[
        vec![0.0, 0.0, 1.0],
        vec![1.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0],
        vec![0.5, 0.5, 0.0],
    ])
    .unwrap()
}

#[test]
fn test_loaded_index_answers_like_the_original() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/dir/hadith.vec");
    let index = sample_index();

    index.persist(&path).unwrap();
    let loaded = FlatIndex::load(&path).unwrap();

    let query = [0.4, 0.6, 0.0];
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.dimension(), Some(VectorDimension::new(3).unwrap()));
    assert_eq!(
        loaded.search(&query, 4).unwrap(),
        index.search(&query, 4).unwrap()
    );
    assert_eq!(
        loaded.search(&query, 1).unwrap()[0].position,
        Position::new(3)
    );
}

#[test]
fn test_header_layout_is_little_endian() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hadith.vec");
    sample_index().persist(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"HVEC");
    assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
    assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 3);
    assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 4);
    assert_eq!(bytes.len(), 16 + 4 * 3 * 4);
    // Third component of the first vector.
    assert_eq!(f32::from_le_bytes(bytes[24..28].try_into().unwrap()), 1.0);
}

#[test]
fn test_overwrite_replaces_previous_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hadith.vec");

    sample_index().persist(&path).unwrap();
    let smaller = FlatIndex::build(&[vec![9.0, 9.0]]).unwrap();
    smaller.persist(&path).unwrap();

    assert_eq!(FlatIndex::load(&path).unwrap(), smaller);
}

#[test]
fn test_trailing_garbage_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hadith.vec");
    sample_index().persist(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        FlatIndex::load(&path),
        Err(VectorError::CorruptIndex { .. })
    ));
}

#[test]
fn test_zero_dimension_header_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hadith.vec");

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"HVEC");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        FlatIndex::load(&path),
        Err(VectorError::CorruptIndex { .. })
    ));
}

#[test]
fn test_missing_file_is_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(matches!(
        FlatIndex::load(&temp_dir.path().join("absent.vec")),
        Err(VectorError::Storage(_))
    ));
}

#[test]
fn test_empty_index_is_not_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hadith.vec");
    let empty = FlatIndex::build(&[]).unwrap();

    assert!(matches!(empty.persist(&path), Err(VectorError::EmptyIndex)));
    assert!(!path.exists());
}

#[test]
fn test_matrix_codec_is_shared_with_embedding_cache() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("embeddings.vec");
    let dimension = VectorDimension::new(2).unwrap();

    write_matrix(&path, dimension, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let index = FlatIndex::load(&path).unwrap();
    assert_eq!(index.vector(Position::new(1)), Some(&[3.0, 4.0][..]));

    let stored = read_matrix(&path).unwrap();
    assert_eq!(stored.count, 2);
    assert_eq!(stored.data, vec![1.0, 2.0, 3.0, 4.0]);
}
