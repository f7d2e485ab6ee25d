//! Tests for the encoder set and the selection factory.

use super::*;
use crate::array::{Array, Bitmap, DataType};
use crate::error::ErrorCode;
use crate::stats::ArrayStats;
use proptest::prelude::*;

fn roundtrip(encoder: Encoder, array: &Array) -> Array {
    let payload = encoder.encode(array).unwrap();
    decode(encoder.encoding(), &array.data_type(), &payload, array.len()).unwrap()
}

// ---------------------------------------------------------------------------
// RLE
// ---------------------------------------------------------------------------

#[test]
fn test_rle_roundtrip_int32() {
    let array = Array::int32(vec![5, 5, 5, -1, -1, 7]);
    assert_eq!(roundtrip(Encoder::Rle, &array), array);
}

#[test]
fn test_rle_roundtrip_int64() {
    let array = Array::int64(vec![i64::MIN, i64::MIN, i64::MAX]);
    assert_eq!(roundtrip(Encoder::Rle, &array), array);
}

#[test]
fn test_rle_layout() {
    let payload = Encoder::Rle.encode(&Array::int32(vec![9, 9, 3])).unwrap();
    // 2 runs: (9, 2), (3, 1)
    assert_eq!(payload[..4], 2u32.to_le_bytes());
    assert_eq!(payload[4..8], 9i32.to_le_bytes());
    assert_eq!(payload[8..12], 2u32.to_le_bytes());
    assert_eq!(payload[12..16], 3i32.to_le_bytes());
    assert_eq!(payload[16..20], 1u32.to_le_bytes());
}

#[test]
fn test_rle_rejects_nulls() {
    let array = Array::int32_opt(vec![Some(1), None]);
    let err = Encoder::Rle.encode(&array).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NullNotSupported);
}

#[test]
fn test_rle_rejects_floats() {
    let err = Encoder::Rle.encode(&Array::float32(vec![1.0])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedType);
}

#[test]
fn test_rle_decode_rejects_count_mismatch() {
    let payload = Encoder::Rle.encode(&Array::int32(vec![1, 1, 2])).unwrap();
    let err = decode(EncodingType::Rle, &DataType::Int32, &payload, 5).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DecodeFailed);
}

// ---------------------------------------------------------------------------
// Bit-packing
// ---------------------------------------------------------------------------

#[test]
fn test_bitpack_roundtrip() {
    let array = Array::int32(vec![0, 1, 5, 13, 15]);
    let encoder = Encoder::BitPacked { bit_width: 4 };
    assert_eq!(roundtrip(encoder, &array), array);
}

#[test]
fn test_bitpack_roundtrip_int64_wide() {
    let array = Array::int64(vec![0, 1 << 40, (1 << 41) - 1]);
    let encoder = Encoder::BitPacked { bit_width: 41 };
    assert_eq!(roundtrip(encoder, &array), array);
}

#[test]
fn test_bitpack_is_lsb_first() {
    // Values 1 and 2 at width 2: bits 01,10 -> byte 0b0000_1001.
    let payload = Encoder::BitPacked { bit_width: 2 }
        .encode(&Array::int32(vec![1, 2]))
        .unwrap();
    assert_eq!(payload[0], 2, "bit width header");
    assert_eq!(payload[1..5], 2u32.to_le_bytes());
    assert_eq!(payload[5], 0b0000_1001);
}

#[test]
fn test_bitpack_rejects_negative() {
    let err = Encoder::BitPacked { bit_width: 8 }
        .encode(&Array::int32(vec![-1]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_bitpack_rejects_overwidth_value() {
    let err = Encoder::BitPacked { bit_width: 3 }
        .encode(&Array::int32(vec![8]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_bitpack_rejects_zero_width() {
    let err = Encoder::BitPacked { bit_width: 0 }
        .encode(&Array::int32(vec![1]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

// ---------------------------------------------------------------------------
// Dictionary
// ---------------------------------------------------------------------------

#[test]
fn test_dictionary_roundtrip_int32() {
    let array = Array::int32(vec![7, 7, -3, 7, -3, 7]);
    assert_eq!(roundtrip(Encoder::Dictionary, &array), array);
}

#[test]
fn test_dictionary_roundtrip_float64() {
    let array = Array::float64(vec![1.5, 1.5, f64::NAN, 1.5]);
    assert_eq!(roundtrip(Encoder::Dictionary, &array), array);
}

#[test]
fn test_dictionary_insertion_order_and_index_size() {
    let payload = Encoder::Dictionary
        .encode(&Array::int32(vec![20, 10, 20]))
        .unwrap();
    assert_eq!(payload[0], 4, "value size");
    assert_eq!(payload[1..5], 2u32.to_le_bytes(), "two entries");
    assert_eq!(payload[5..9], 3u32.to_le_bytes(), "three values");
    assert_eq!(payload[9], 2, "small dictionaries use u16 indices");
    // Entries in insertion order: 20 then 10.
    assert_eq!(payload[10..14], 20i32.to_le_bytes());
    assert_eq!(payload[14..18], 10i32.to_le_bytes());
    // Indices 0, 1, 0.
    assert_eq!(payload[18..20], 0u16.to_le_bytes());
    assert_eq!(payload[20..22], 1u16.to_le_bytes());
    assert_eq!(payload[22..24], 0u16.to_le_bytes());
}

#[test]
fn test_dictionary_decode_rejects_out_of_range_index() {
    let mut payload = Encoder::Dictionary
        .encode(&Array::int32(vec![1, 2, 1]))
        .unwrap();
    // Corrupt the last u16 index to point past the dictionary.
    let at = payload.len() - 2;
    payload[at..].copy_from_slice(&9u16.to_le_bytes());
    let err = decode(EncodingType::Dictionary, &DataType::Int32, &payload, 3).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DecodeFailed);
}

#[test]
fn test_dictionary_rejects_nulls() {
    let err = Encoder::Dictionary
        .encode(&Array::int32_opt(vec![None]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NullNotSupported);
}

// ---------------------------------------------------------------------------
// Byte-stream-split
// ---------------------------------------------------------------------------

#[test]
fn test_bss_roundtrip_float32() {
    let array = Array::float32(vec![1.0, -2.5, f32::NAN, 0.0]);
    assert_eq!(roundtrip(Encoder::ByteStreamSplit, &array), array);
}

#[test]
fn test_bss_stream_layout() {
    let payload = Encoder::ByteStreamSplit
        .encode(&Array::float32(vec![1.0, 2.0]))
        .unwrap();
    let a = 1.0f32.to_le_bytes();
    let b = 2.0f32.to_le_bytes();
    assert_eq!(payload[..4], 2u32.to_le_bytes());
    // Stream 0 holds byte 0 of each value, and so on.
    assert_eq!(payload[4..], [a[0], b[0], a[1], b[1], a[2], b[2], a[3], b[3]]);
}

#[test]
fn test_bss_rejects_integers() {
    let err = Encoder::ByteStreamSplit
        .encode(&Array::int32(vec![1]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedType);
}

// ---------------------------------------------------------------------------
// General compressor
// ---------------------------------------------------------------------------

#[test]
fn test_zstd_roundtrip_all_primitives() {
    let arrays = vec![
        Array::int32(vec![1, 2, 3]),
        Array::int64(vec![-9, 9]),
        Array::float32(vec![0.5, f32::INFINITY]),
        Array::float64(vec![1e300, -1e-300]),
    ];
    for array in arrays {
        assert_eq!(
            roundtrip(Encoder::Zstd { level: 3 }, &array),
            array,
            "{}",
            array.data_type()
        );
    }
}

#[test]
fn test_zstd_roundtrip_preserves_null_bitmap() {
    let array = Array::int32_opt(vec![Some(0), None, Some(4), None, Some(8)]);
    let decoded = roundtrip(Encoder::Zstd { level: 3 }, &array);
    assert_eq!(decoded, array);
    assert_eq!(
        decoded.validity().unwrap().as_bytes(),
        array.validity().unwrap().as_bytes(),
        "bitmap must match bit-for-bit"
    );
}

#[test]
fn test_zstd_roundtrip_fixed_size_list_with_nulls() {
    let child = Array::float32(vec![1.0, 2.0, 0.0, 0.0, 5.0, 6.0]);
    let validity = Bitmap::from_bools(&[true, false, true]);
    let array = Array::fixed_size_list_with_validity(child, 2, Some(validity)).unwrap();
    assert_eq!(roundtrip(Encoder::Zstd { level: 3 }, &array), array);
}

#[test]
fn test_zstd_decode_rejects_garbage() {
    let err = decode(EncodingType::Zstd, &DataType::Int32, &[1, 2, 3, 4], 1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CorruptedFile);
}

// ---------------------------------------------------------------------------
// BSS -> zstd chain
// ---------------------------------------------------------------------------

#[test]
fn test_chain_tagged_as_zstd() {
    assert_eq!(Encoder::BssZstd { level: 3 }.encoding(), EncodingType::Zstd);
}

#[test]
fn test_chain_roundtrip_float32() {
    let array = Array::float32((0..500).map(|i| i as f32 * 0.25).collect());
    assert_eq!(roundtrip(Encoder::BssZstd { level: 3 }, &array), array);
}

#[test]
fn test_chain_roundtrip_float64() {
    let array = Array::float64((0..300).map(|i| f64::from(i) * 1.5 - 10.0).collect());
    assert_eq!(roundtrip(Encoder::BssZstd { level: 3 }, &array), array);
}

#[test]
fn test_chain_and_plain_zstd_frames_are_disambiguated() {
    // Same logical array through both zstd-tagged layouts; both must decode.
    let array = Array::float32((0..256).map(|i| (i as f32).sin()).collect());
    let chained = roundtrip(Encoder::BssZstd { level: 3 }, &array);
    let plain = roundtrip(Encoder::Zstd { level: 3 }, &array);
    assert_eq!(chained, array);
    assert_eq!(plain, array);
}

#[test]
fn test_chain_rejects_nulls() {
    let err = Encoder::BssZstd { level: 3 }
        .encode(&Array::float32_opt(vec![Some(1.0), None]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NullNotSupported);
}

// ---------------------------------------------------------------------------
// Factory selection
// ---------------------------------------------------------------------------

fn select_for(array: &Array) -> Encoder {
    let stats = ArrayStats::compute(array);
    select_encoder(&EncoderConfig::default(), &array.data_type(), Some(&stats))
}

#[test]
fn test_factory_no_stats_selects_zstd() {
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, None);
    assert!(matches!(enc, Encoder::Zstd { .. }));
}

#[test]
fn test_factory_small_arrays_select_zstd() {
    let array = Array::int32(vec![1; 50]);
    assert!(matches!(select_for(&array), Encoder::Zstd { .. }));
}

#[test]
fn test_factory_long_runs_select_rle() {
    let mut values = vec![1i32; 500];
    values.extend(vec![2i32; 500]);
    let array = Array::int32(values);
    assert_eq!(select_for(&array), Encoder::Rle);
}

/// Hand-built statistics pin the decision tree without depending on the
/// HyperLogLog estimate of a particular input.
fn synthetic_stats(
    num_values: usize,
    run_count: usize,
    cardinality: usize,
    max_bit_width: u8,
    entropy_milli: u32,
) -> ArrayStats {
    ArrayStats {
        num_values,
        null_count: 0,
        bit_widths: vec![max_bit_width],
        data_size: num_values * 4,
        run_count,
        cardinality,
        byte_entropy: vec![entropy_milli; 4],
    }
}

#[test]
fn test_factory_small_width_selects_bitpack() {
    // No runs, high cardinality, 10 significant bits.
    let stats = synthetic_stats(1000, 1000, 900, 10, 5000);
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, Some(&stats));
    assert_eq!(enc, Encoder::BitPacked { bit_width: 10 });
}

#[test]
fn test_factory_low_cardinality_selects_dictionary() {
    // No runs, 8 distinct values out of 2000, too wide to pack.
    let stats = synthetic_stats(2000, 2000, 8, 24, 5000);
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, Some(&stats));
    assert_eq!(enc, Encoder::Dictionary);

    // The same shape above the dictionary size guard compresses instead.
    let config = EncoderConfig {
        dictionary_max_size: 4,
        ..EncoderConfig::default()
    };
    let enc = select_encoder(&config, &DataType::Int32, Some(&stats));
    assert!(matches!(enc, Encoder::Zstd { .. }));
}

#[test]
fn test_factory_moderate_cardinality_dictionary_after_bitpack_check() {
    // Too wide to pack, cardinality ratio 0.3 under the 0.5 threshold.
    let stats = synthetic_stats(1000, 1000, 300, 24, 5000);
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, Some(&stats));
    assert_eq!(enc, Encoder::Dictionary);
}

#[test]
fn test_factory_late_rle_branch() {
    // Wide, high cardinality, but runs average above two values.
    let stats = synthetic_stats(1000, 400, 900, 24, 5000);
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, Some(&stats));
    assert_eq!(enc, Encoder::Rle);
}

#[test]
fn test_factory_wide_high_cardinality_selects_zstd() {
    // Wide values, all distinct, no runs: every specialized branch loses.
    let stats = synthetic_stats(2000, 2000, 2000, 31, 7000);
    let enc = select_encoder(&EncoderConfig::default(), &DataType::Int32, Some(&stats));
    assert!(matches!(enc, Encoder::Zstd { .. }));
}

#[test]
fn test_factory_fixed_size_list_always_zstd() {
    let child = Array::float32(vec![0.0; 4096]);
    let array = Array::fixed_size_list(child, 4).unwrap();
    assert!(matches!(select_for(&array), Encoder::Zstd { .. }));
}

#[test]
fn test_factory_low_entropy_floats_select_chain() {
    let array = Array::float32(vec![1.25; 1000]);
    assert!(matches!(select_for(&array), Encoder::BssZstd { .. }));
}

#[test]
fn test_factory_high_entropy_floats_select_zstd() {
    // Pseudo-random bit patterns: every byte position near 8 bits entropy.
    let values: Vec<f32> = (0..1000u32)
        .map(|i| f32::from_bits(i.wrapping_mul(2_654_435_761).rotate_left(7) | 0x3F00_0000))
        .collect();
    let array = Array::float32(values);
    assert!(matches!(select_for(&array), Encoder::Zstd { .. }));
}

#[test]
fn test_plain_tag_is_rejected_on_decode() {
    let err = decode(EncodingType::Plain, &DataType::Int32, &[], 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
}

#[test]
fn test_delta_tag_is_rejected_on_decode() {
    let err = decode(EncodingType::Delta, &DataType::Int32, &[], 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_rle_roundtrip(values in prop::collection::vec(-100i32..100, 1..300)) {
        let array = Array::int32(values);
        prop_assert_eq!(roundtrip(Encoder::Rle, &array), array);
    }

    #[test]
    fn prop_bitpack_roundtrip(values in prop::collection::vec(0i64..65_536, 1..300)) {
        let array = Array::int64(values);
        let encoder = Encoder::BitPacked { bit_width: 17 };
        prop_assert_eq!(roundtrip(encoder, &array), array);
    }

    #[test]
    fn prop_dictionary_roundtrip(values in prop::collection::vec(any::<i64>(), 1..200)) {
        let array = Array::int64(values);
        prop_assert_eq!(roundtrip(Encoder::Dictionary, &array), array);
    }

    #[test]
    fn prop_zstd_roundtrip_with_nulls(values in prop::collection::vec(prop::option::of(any::<i32>()), 1..200)) {
        let array = Array::int32_opt(values);
        prop_assert_eq!(roundtrip(Encoder::Zstd { level: 3 }, &array), array);
    }

    #[test]
    fn prop_chain_roundtrip(values in prop::collection::vec(any::<f32>(), 1..200)) {
        let array = Array::float32(values);
        prop_assert_eq!(roundtrip(Encoder::BssZstd { level: 3 }, &array), array);
    }
}
