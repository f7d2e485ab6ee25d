//! Tests for columnar arrays and schemas.

use super::*;
use crate::error::ErrorCode;

#[test]
fn test_int32_opt_constructor_tracks_nulls() {
    let array = Array::int32_opt(vec![Some(1), None, Some(3)]);
    assert_eq!(array.len(), 3);
    assert_eq!(array.null_count(), 1);
    assert!(array.is_valid(0));
    assert!(!array.is_valid(1));
    assert!(array.is_valid(2));
}

#[test]
fn test_value_bytes_roundtrip_primitives() {
    let cases = vec![
        Array::int32(vec![1, -2, i32::MAX]),
        Array::int64(vec![i64::MIN, 0, 42]),
        Array::float32(vec![1.5, -0.0, f32::NAN]),
        Array::float64(vec![std::f64::consts::PI, -1.0]),
    ];
    for array in cases {
        let bytes = array.value_bytes();
        let restored =
            Array::from_le_bytes(&array.data_type(), &bytes, array.len(), None).unwrap();
        assert_eq!(restored, array, "{}", array.data_type());
    }
}

#[test]
fn test_from_le_bytes_rejects_bad_length() {
    let err = Array::from_le_bytes(&DataType::Int32, &[0u8; 7], 2, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DecodeFailed);
}

#[test]
fn test_fixed_size_list_basic() {
    let child = Array::float32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let array = Array::fixed_size_list(child, 3).unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(
        array.data_type(),
        DataType::FixedSizeList(Box::new(DataType::Float32), 3)
    );
    assert_eq!(array.data_size(), 24);
}

#[test]
fn test_fixed_size_list_rejects_ragged_child() {
    let child = Array::float32(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let err = Array::fixed_size_list(child, 3).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_fixed_size_list_rejects_nested_list() {
    let child = Array::float32(vec![1.0, 2.0]);
    let inner = Array::fixed_size_list(child, 2).unwrap();
    let err = Array::fixed_size_list(inner, 1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_float_equality_is_bit_pattern() {
    let a = Array::float32(vec![f32::NAN, 1.0]);
    let b = Array::float32(vec![f32::NAN, 1.0]);
    assert_eq!(a, b, "NaN must be self-equal under bit-pattern comparison");

    let c = Array::float32(vec![0.0, 1.0]);
    let d = Array::float32(vec![-0.0, 1.0]);
    assert_ne!(c, d, "-0.0 and +0.0 have different bit patterns");
}

#[test]
fn test_equality_ignores_values_under_nulls() {
    let a = Array::Int32 {
        values: vec![1, 999, 3],
        validity: Some(Bitmap::from_bools(&[true, false, true])),
    };
    let b = Array::Int32 {
        values: vec![1, -7, 3],
        validity: Some(Bitmap::from_bools(&[true, false, true])),
    };
    assert_eq!(a, b);

    let c = Array::Int32 {
        values: vec![1, 2, 3],
        validity: Some(Bitmap::from_bools(&[true, true, true])),
    };
    let d = Array::int32(vec![1, 2, 3]);
    assert_eq!(c, d, "an all-valid bitmap equals an absent bitmap");
}

#[test]
fn test_concat_preserves_order_and_nulls() {
    let a = Array::int32(vec![1, 2]);
    let b = Array::int32_opt(vec![Some(3), None]);
    let c = Array::int32(vec![5]);
    let merged = Array::concat(&[a, b, c]).unwrap();

    assert_eq!(merged.len(), 5);
    assert_eq!(merged.null_count(), 1);
    assert_eq!(merged.as_i32().unwrap()[..3], [1, 2, 3]);
    assert!(!merged.is_valid(3));
    assert!(merged.is_valid(4));
    assert_eq!(merged.as_i32().unwrap()[4], 5);
}

#[test]
fn test_concat_fixed_size_lists() {
    let a = Array::fixed_size_list(Array::float32(vec![1.0, 2.0]), 2).unwrap();
    let b = Array::fixed_size_list(Array::float32(vec![3.0, 4.0, 5.0, 6.0]), 2).unwrap();
    let merged = Array::concat(&[a, b]).unwrap();
    assert_eq!(merged.len(), 3);
    assert_eq!(
        merged.child().unwrap().as_f32().unwrap(),
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
}

#[test]
fn test_concat_rejects_mixed_types() {
    let a = Array::int32(vec![1]);
    let b = Array::int64(vec![2]);
    let err = Array::concat(&[a, b]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);
}

#[test]
fn test_schema_binary_roundtrip() {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int32),
        Field::new(
            "vector",
            DataType::FixedSizeList(Box::new(DataType::Float32), 128),
        ),
        Field::nullable("score", DataType::Float64).with_metadata("unit", "l2"),
    ])
    .with_metadata("writer", "perundb");

    let bytes = schema.to_bytes();
    let restored = Schema::from_bytes(&bytes).unwrap();
    assert_eq!(restored, schema);
}

#[test]
fn test_schema_decode_rejects_truncation() {
    let schema = Schema::new(vec![Field::new("id", DataType::Int32)]);
    let bytes = schema.to_bytes();
    let err = Schema::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CorruptedFile);
}

#[test]
fn test_record_batch_validates_shape() {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int32),
        Field::new("value", DataType::Float32),
    ]);

    let ok = RecordBatch::new(
        schema.clone(),
        vec![Array::int32(vec![1, 2]), Array::float32(vec![0.1, 0.2])],
    )
    .unwrap();
    assert_eq!(ok.num_rows(), 2);

    let wrong_len = RecordBatch::new(
        schema.clone(),
        vec![Array::int32(vec![1, 2]), Array::float32(vec![0.1])],
    );
    assert_eq!(wrong_len.unwrap_err().code(), ErrorCode::SchemaMismatch);

    let wrong_type = RecordBatch::new(
        schema.clone(),
        vec![Array::int32(vec![1]), Array::int32(vec![1])],
    );
    assert_eq!(wrong_type.unwrap_err().code(), ErrorCode::SchemaMismatch);

    let nulls_in_non_nullable = RecordBatch::new(
        schema,
        vec![
            Array::int32_opt(vec![Some(1), None]),
            Array::float32(vec![0.1, 0.2]),
        ],
    );
    assert_eq!(
        nulls_in_non_nullable.unwrap_err().code(),
        ErrorCode::SchemaMismatch
    );
}
