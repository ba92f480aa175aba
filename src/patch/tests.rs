use super::*;
use crate::column::ColumnCompression;
use crate::config::{EngineConfig, EngineContext};
use crate::dimstats::DimStats;
use crate::error::PointCloudError;
use crate::point::{Point, PointList};
use crate::schema::{Dimension, Schema};
use crate::types::{Compression, Interpretation};
use crate::wire::Endian;
use std::sync::Arc;

//==================================================================================
// Helpers
//==================================================================================

fn schema_with(pcid: u32, compression: Compression) -> SchemaRef {
    let mut schema = Schema::new(4).with_pcid(pcid).with_compression(compression);
    schema
        .set_dimension(Dimension::new("X", 0, Interpretation::Int32))
        .unwrap();
    schema
        .set_dimension(Dimension::new("Y", 1, Interpretation::Int32))
        .unwrap();
    schema
        .set_dimension(Dimension::new("Z", 2, Interpretation::Float64))
        .unwrap();
    schema
        .set_dimension(Dimension::new("Intensity", 3, Interpretation::UInt16))
        .unwrap();
    assert!(schema.check_xy());
    Arc::new(schema)
}

fn schema(compression: Compression) -> SchemaRef {
    schema_with(1, compression)
}

fn sample(n: usize) -> Vec<[f64; 4]> {
    (0..n)
        .map(|i| {
            [
                i as f64,
                ((i * 7) % 13) as f64,
                i as f64 * 0.5,
                (50 + i % 3) as f64,
            ]
        })
        .collect()
}

fn patch(schema: &SchemaRef, values: &[[f64; 4]]) -> Patch {
    let list: PointList<'static> = values
        .iter()
        .map(|v| Point::from_doubles(schema.clone(), v).unwrap())
        .collect();
    Patch::from_pointlist(&list).unwrap()
}

fn ctx() -> EngineContext {
    EngineContext::default().with_bundled_opaque_codec()
}

fn column_values(patch: &Patch, name: &str, ctx: &EngineContext) -> Vec<f64> {
    PointList::from_patch(patch, ctx)
        .unwrap()
        .iter()
        .map(|p| p.get_double_by_name(name).unwrap())
        .collect()
}

//==================================================================================
// Conversion and wire
//==================================================================================

#[test]
fn test_wire_round_trip_every_representation_and_endian() {
    let ctx = ctx();
    for compression in [Compression::None, Compression::Dimensional, Compression::Opaque] {
        let schema = schema(compression);
        let source = patch(&schema, &sample(40));
        let rows = source.uncompress(&ctx).unwrap().data().to_vec();
        let converted = source.compress(None, &ctx).unwrap().into_owned();
        assert_eq!(converted.representation(), compression);

        for endian in [Endian::Big, Endian::Little] {
            let bytes = converted.to_wire_with_endian(endian, &ctx).unwrap();
            assert_eq!(bytes[0], endian.flag());
            if !endian.is_foreign() {
                assert_eq!(bytes.len(), converted.serialized_size());
            }

            let back = Patch::from_wire(schema.clone(), &bytes, &ctx).unwrap();
            assert_eq!(back.representation(), compression);
            assert_eq!(back.npoints(), 40);
            assert_eq!(back.bounds(), source.bounds());
            assert!(back.stats().is_some());
            assert_eq!(back.uncompress(&ctx).unwrap().data(), &rows[..]);
        }
    }
}

#[test]
fn test_dimensional_round_trip_restores_rows() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let source = patch(&schema, &sample(64));
    let compressed = source.compress(None, &ctx).unwrap();
    let Patch::Dimensional(dim) = compressed.as_ref() else {
        panic!("expected a dimensional patch");
    };
    assert_eq!(dim.columns().len(), 4);
    assert_eq!(
        compressed.uncompress(&ctx).unwrap().data(),
        source.uncompress(&ctx).unwrap().data()
    );
}

#[test]
fn test_compress_is_identity_for_matching_representation() {
    let ctx = ctx();
    let source = patch(&schema(Compression::None), &sample(5));
    assert!(matches!(source.compress(None, &ctx).unwrap(), Cow::Borrowed(_)));
}

#[test]
fn test_compress_to_none_materializes_dimensional() {
    let ctx = ctx();
    let schema = schema(Compression::None);
    let source = patch(&schema, &sample(12));
    let raw = source.uncompress(&ctx).unwrap();
    let dimensional = Patch::Dimensional(DimensionalPatch::from_uncompressed(&raw));
    let back = dimensional.compress(None, &ctx).unwrap();
    assert_eq!(back.representation(), Compression::None);
    assert_eq!(back.uncompress(&ctx).unwrap().data(), raw.data());
}

#[test]
fn test_compress_between_opaque_and_dimensional() {
    let ctx = ctx();
    let values = sample(25);

    let dimensional_schema = schema(Compression::Dimensional);
    let source = patch(&dimensional_schema, &values);
    let raw = source.uncompress(&ctx).unwrap();
    let opaque = Patch::Opaque(OpaquePatch::from_uncompressed(&raw, &ZstdOpaqueCodec::default()).unwrap());
    let dimensional = opaque.compress(None, &ctx).unwrap();
    assert_eq!(dimensional.representation(), Compression::Dimensional);
    assert_eq!(dimensional.uncompress(&ctx).unwrap().data(), raw.data());

    let opaque_schema = schema(Compression::Opaque);
    let source = patch(&opaque_schema, &values);
    let raw = source.uncompress(&ctx).unwrap();
    let mut stats = DimStats::new(&opaque_schema);
    let encoded = DimensionalPatch::from_uncompressed(&raw)
        .compress(&mut stats, &ctx.config)
        .unwrap();
    let dimensional = Patch::Dimensional(encoded);
    let opaque = dimensional.compress(None, &ctx).unwrap();
    assert_eq!(opaque.representation(), Compression::Opaque);
    assert_eq!(opaque.uncompress(&ctx).unwrap().data(), raw.data());
}

fn scaled_schema() -> SchemaRef {
    let mut schema = Schema::new(3).with_pcid(7).with_compression(Compression::Dimensional);
    schema
        .set_dimension(Dimension::new("X", 0, Interpretation::Int32).with_scale(0.01))
        .unwrap();
    schema
        .set_dimension(Dimension::new("Y", 1, Interpretation::Int32).with_scale(0.01))
        .unwrap();
    schema
        .set_dimension(Dimension::new("Intensity", 2, Interpretation::UInt16))
        .unwrap();
    assert!(schema.check_xy());
    Arc::new(schema)
}

fn assert_triples(patch: &Patch, expected: &[[f64; 3]], ctx: &EngineContext) {
    let points = PointList::from_patch(patch, ctx).unwrap();
    assert_eq!(points.len(), expected.len());
    for (point, triple) in points.iter().zip(expected) {
        for (value, want) in point.to_doubles().iter().zip(triple) {
            assert!((value - want).abs() < 1e-9, "{} != {}", value, want);
        }
    }
}

#[test]
fn test_scaled_xy_intensity_scenario() {
    let ctx = ctx();
    let schema = scaled_schema();
    let triples = [[100.0, 200.0, 50.0], [100.0, 200.0, 75.0], [150.0, 250.0, 50.0]];
    let list: PointList<'static> = triples
        .iter()
        .map(|t| Point::from_doubles(schema.clone(), t).unwrap())
        .collect();
    let source = Patch::from_pointlist(&list).unwrap();
    let raw = source.uncompress(&ctx).unwrap();
    assert_eq!(raw.point(2).unwrap().data()[..4], 15000i32.to_ne_bytes()[..]);

    let mut stats = DimStats::new(&schema);
    let compressed = source.compress(Some(&mut stats), &ctx).unwrap().into_owned();
    assert_eq!(stats.recommendation(2), Some(ColumnCompression::Deflate));
    assert_triples(&compressed, &triples, &ctx);
    assert_eq!(compressed.uncompress(&ctx).unwrap().data(), raw.data());

    // A single intensity run over enough points tips the column to RLE.
    let constant: Vec<[f64; 3]> = (0..7).map(|i| [100.0 + i as f64, 200.0, 50.0]).collect();
    let list: PointList<'static> = constant
        .iter()
        .map(|t| Point::from_doubles(schema.clone(), t).unwrap())
        .collect();
    let compressed = Patch::from_pointlist(&list)
        .unwrap()
        .compress(None, &ctx)
        .unwrap()
        .into_owned();
    let Patch::Dimensional(dim) = &compressed else {
        panic!("expected a dimensional patch");
    };
    assert_eq!(dim.column_compressions()[2], ColumnCompression::Rle);
    assert_triples(&compressed, &constant, &ctx);
}

#[test]
fn test_small_patch_recommends_deflate() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let source = patch(
        &schema,
        &[
            [1.0, 2.0, 0.5, 50.0],
            [2.0, 3.0, 0.5, 75.0],
            [3.0, 4.0, 0.5, 50.0],
        ],
    );
    let mut stats = DimStats::new(&schema);
    let compressed = source.compress(Some(&mut stats), &ctx).unwrap();
    assert_eq!(stats.total_points, 3);
    assert_eq!(stats.recommendation(3), Some(ColumnCompression::Deflate));
    let Patch::Dimensional(dim) = compressed.as_ref() else {
        panic!("expected a dimensional patch");
    };
    assert_eq!(dim.column_compressions()[3], ColumnCompression::Deflate);
    assert_eq!(dim.column_compressions()[2], ColumnCompression::Deflate);
    assert_eq!(
        compressed.uncompress(&ctx).unwrap().data(),
        source.uncompress(&ctx).unwrap().data()
    );
}

#[test]
fn test_constant_column_recommends_rle() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let values: Vec<[f64; 4]> = (0..7).map(|i| [i as f64, 1.0, 2.0, 60.0]).collect();
    let source = patch(&schema, &values);
    let compressed = source.compress(None, &ctx).unwrap().into_owned();
    let Patch::Dimensional(dim) = &compressed else {
        panic!("expected a dimensional patch");
    };
    assert_eq!(dim.column_compressions()[1], ColumnCompression::Rle);
    assert_eq!(dim.column_compressions()[3], ColumnCompression::Rle);
    // Doubles never leave deflate, however repetitive.
    assert_eq!(dim.column_compressions()[2], ColumnCompression::Deflate);
    assert_eq!(column_values(&compressed, "Intensity", &ctx), vec![60.0; 7]);
    assert_eq!(column_values(&compressed, "X", &ctx), column_values(&source, "X", &ctx));
}

#[test]
fn test_stats_stop_sampling_at_threshold() {
    let ctx = EngineContext::new(EngineConfig {
        sample_threshold: 10,
        ..EngineConfig::default()
    });
    let schema = schema(Compression::Dimensional);
    let source = patch(&schema, &sample(8));
    let mut stats = DimStats::new(&schema);
    source.compress(Some(&mut stats), &ctx).unwrap();
    source.compress(Some(&mut stats), &ctx).unwrap();
    source.compress(Some(&mut stats), &ctx).unwrap();
    assert_eq!(stats.total_points, 16);
    assert_eq!(stats.total_patches, 2);
}

#[test]
fn test_opaque_without_codec_is_unsupported() {
    let with_codec = ctx();
    let without = EngineContext::default();
    let schema = schema(Compression::Opaque);
    let source = patch(&schema, &sample(10));
    assert!(matches!(
        source.compress(None, &without),
        Err(PointCloudError::UnsupportedConversion(_))
    ));

    let opaque = source.compress(None, &with_codec).unwrap();
    let bytes = opaque.to_wire(&with_codec).unwrap();
    assert!(matches!(
        Patch::from_wire(schema, &bytes, &without),
        Err(PointCloudError::UnsupportedConversion(_))
    ));
}

#[test]
fn test_from_wire_rejects_bad_input() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let compressed = patch(&schema, &sample(10)).compress(None, &ctx).unwrap().into_owned();
    let mut bytes = compressed.to_wire(&ctx).unwrap();

    let other = schema_with(2, Compression::Dimensional);
    assert!(matches!(
        Patch::from_wire(other, &bytes, &ctx),
        Err(PointCloudError::SchemaIdMismatch { wire: 1, schema: 2 })
    ));

    bytes.push(0);
    assert!(matches!(
        Patch::from_wire(schema.clone(), &bytes, &ctx),
        Err(PointCloudError::CorruptWireData(_))
    ));
    assert!(matches!(
        Patch::from_wire(schema.clone(), &bytes[..3], &ctx),
        Err(PointCloudError::CorruptWireData(_))
    ));
    assert!(Patch::from_wire(schema, &[], &ctx).is_err());
}

#[test]
fn test_from_wire_rejects_inflated_point_count() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let mut bytes = vec![Endian::native().flag()];
    bytes.extend_from_slice(&1u32.to_ne_bytes());
    bytes.extend_from_slice(&Compression::Dimensional.tag().to_ne_bytes());
    bytes.extend_from_slice(&u32::MAX.to_ne_bytes());
    for dim in schema.dimensions() {
        bytes.push(ColumnCompression::Rle.tag());
        bytes.extend_from_slice(&((dim.size + 1) as u32).to_ne_bytes());
        bytes.push(1);
        bytes.extend(std::iter::repeat(0u8).take(dim.size));
    }
    assert!(matches!(
        Patch::from_wire(schema, &bytes, &ctx),
        Err(PointCloudError::RleDecodeError(_))
    ));
}

#[test]
fn test_from_wire_rejects_forged_opaque_length() {
    let ctx = ctx();
    let schema = schema(Compression::Opaque);
    let mut bytes = vec![Endian::Little.flag()];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&Compression::Opaque.tag().to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&u64::MAX.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(
        Patch::from_wire(schema, &bytes, &ctx),
        Err(PointCloudError::ZstdError(_))
    ));
}

#[test]
fn test_partial_row_is_corrupt() {
    let ctx = ctx();
    let schema = schema(Compression::None);
    let mut bytes = patch(&schema, &sample(3)).to_wire(&ctx).unwrap();
    bytes.pop();
    assert!(matches!(
        Patch::from_wire(schema, &bytes, &ctx),
        Err(PointCloudError::CorruptWireData(_))
    ));
}

//==================================================================================
// Reduction, merge and filters
//==================================================================================

#[test]
fn test_reduce_dimension_keeps_values_in_order() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let values = sample(20);
    let source = patch(&schema, &values);
    let dimensional = source.compress(None, &ctx).unwrap();

    let reduced = dimensional.reduce_dimension(&["Intensity", "x"]).unwrap();
    let reduced_schema = reduced.schema();
    assert_eq!(reduced_schema.ndims(), 2);
    assert_eq!(reduced_schema.pcid(), 1);
    assert_eq!(reduced_schema.dimension(0).unwrap().name, "Intensity");
    assert_eq!(reduced_schema.x_position(), Some(1));
    assert_eq!(reduced_schema.y_position(), None);
    assert_eq!(reduced.npoints(), 20);
    assert_eq!(reduced.bounds(), source.bounds());

    assert_eq!(
        column_values(&reduced, "Intensity", &ctx),
        column_values(&source, "Intensity", &ctx)
    );
    assert_eq!(column_values(&reduced, "X", &ctx), column_values(&source, "X", &ctx));
}

#[test]
fn test_reduce_dimension_errors() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let source = patch(&schema, &sample(5));
    assert!(matches!(
        source.reduce_dimension(&["X"]),
        Err(PointCloudError::UnsupportedConversion(_))
    ));
    let dimensional = source.compress(None, &ctx).unwrap();
    assert!(matches!(
        dimensional.reduce_dimension(&["X", "Classification"]),
        Err(PointCloudError::DimensionNotFound(name)) if name == "Classification"
    ));
}

#[test]
fn test_merge_concatenates_in_order() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let a = patch(&schema, &sample(10));
    let far: Vec<[f64; 4]> = (0..5).map(|i| [100.0 + i as f64, 200.0, 1.0, 9.0]).collect();
    let b = patch(&schema, &far);
    let b_dimensional = b.compress(None, &ctx).unwrap().into_owned();

    let merged = Patch::from_patchlist(&[a.clone(), b_dimensional], &ctx).unwrap();
    assert_eq!(merged.representation(), Compression::None);
    assert_eq!(merged.npoints(), 15);

    let mut expected = a.uncompress(&ctx).unwrap().data().to_vec();
    expected.extend_from_slice(b.uncompress(&ctx).unwrap().data());
    assert_eq!(merged.uncompress(&ctx).unwrap().data(), &expected[..]);

    let mut bounds = *a.bounds();
    bounds.merge(b.bounds());
    assert_eq!(merged.bounds(), &bounds);
    assert_eq!(merged.stat_by_name("X", StatKind::Max).unwrap(), Some(104.0));
    assert_eq!(merged.stat_by_name("X", StatKind::Min).unwrap(), Some(0.0));
}

#[test]
fn test_merge_rejects_empty_and_mixed_schemas() {
    let ctx = ctx();
    assert!(matches!(
        Patch::from_patchlist(&[], &ctx),
        Err(PointCloudError::InconsistentInput(_))
    ));
    let a = patch(&schema_with(1, Compression::None), &sample(3));
    let b = patch(&schema_with(2, Compression::None), &sample(3));
    assert!(matches!(
        Patch::from_patchlist(&[a, b], &ctx),
        Err(PointCloudError::InconsistentInput(_))
    ));
}

#[test]
fn test_filters_partition_the_patch() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let source = patch(&schema, &sample(30)).compress(None, &ctx).unwrap().into_owned();

    let lt = source.filter_lt_by_name("X", 10.0, &ctx).unwrap();
    let eq = source.filter_eq_by_name("X", 10.0, &ctx).unwrap();
    let gt = source.filter_gt_by_name("x", 10.0, &ctx).unwrap();
    assert_eq!(lt.representation(), Compression::None);
    assert_eq!((lt.npoints(), eq.npoints(), gt.npoints()), (10, 1, 19));
    assert!(column_values(&lt, "X", &ctx).iter().all(|&x| x < 10.0));
    assert!(column_values(&gt, "X", &ctx).iter().all(|&x| x > 10.0));
    assert_eq!(lt.bounds().xmax, 9.0);
    assert_eq!(gt.stat_by_name("X", StatKind::Min).unwrap(), Some(11.0));

    let between = source.filter_between_by_name("X", 20.0, 5.0, &ctx).unwrap();
    assert_eq!(between.npoints(), 16);
}

#[test]
fn test_filter_empty_result_and_unknown_dimension() {
    let ctx = ctx();
    let source = patch(&schema(Compression::None), &sample(10));
    let none = source.filter_lt_by_name("Intensity", 0.0, &ctx).unwrap();
    assert_eq!(none.npoints(), 0);
    assert!(none.bounds().is_empty());
    assert!(none.stats().is_none());
    assert_eq!(none.stat_by_name("X", StatKind::Avg).unwrap(), None);

    assert!(matches!(
        source.filter_gt_by_name("Red", 1.0, &ctx),
        Err(PointCloudError::DimensionNotFound(_))
    ));
}

//==================================================================================
// Summaries
//==================================================================================

#[test]
fn test_stat_by_name() {
    let source = patch(&schema(Compression::None), &sample(6));
    assert_eq!(source.stat_by_name("intensity", StatKind::Max).unwrap(), Some(52.0));
    // Statistics are stored through the dimension type, so an int32 mean rounds.
    assert_eq!(source.stat_by_name("X", StatKind::Avg).unwrap(), Some(3.0));
    assert_eq!(source.stat_by_name("Z", StatKind::Avg).unwrap(), Some(1.25));
    let kind: StatKind = "MIN".parse().unwrap();
    assert_eq!(source.stat_by_name("Z", kind).unwrap(), Some(0.0));
    assert!(matches!(
        source.stat_by_name("W", StatKind::Min),
        Err(PointCloudError::DimensionNotFound(_))
    ));
}

#[test]
fn test_intersects() {
    let schema = schema(Compression::None);
    let a = patch(&schema, &[[0.0, 0.0, 0.0, 1.0], [10.0, 10.0, 0.0, 1.0]]);
    let b = patch(&schema, &[[5.0, 5.0, 0.0, 1.0], [20.0, 20.0, 0.0, 1.0]]);
    let c = patch(&schema, &[[50.0, 50.0, 0.0, 1.0]]);
    assert!(a.intersects(&b).unwrap());
    assert!(!a.intersects(&c).unwrap());

    let other = patch(&schema_with(9, Compression::None), &[[5.0, 5.0, 0.0, 1.0]]);
    assert!(matches!(
        a.intersects(&other),
        Err(PointCloudError::InconsistentInput(_))
    ));
}

#[test]
fn test_compute_extent_on_dimensional() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let source = patch(&schema, &sample(13));
    let raw = source.uncompress(&ctx).unwrap();
    let mut dimensional = Patch::Dimensional(DimensionalPatch::from_uncompressed(&raw));
    dimensional.compute_extent(&ctx).unwrap();
    dimensional.compute_stats(&ctx).unwrap();
    assert_eq!(dimensional.bounds(), source.bounds());
    assert_eq!(dimensional.bounds().xmax, 12.0);
    assert_eq!(dimensional.stat_by_name("Y", StatKind::Max).unwrap(), Some(12.0));
}

#[test]
fn test_summary_json() {
    let ctx = ctx();
    let schema = schema(Compression::Dimensional);
    let compressed = patch(&schema, &sample(9)).compress(None, &ctx).unwrap().into_owned();
    let json: serde_json::Value = serde_json::from_str(&compressed.summary_json().unwrap()).unwrap();
    assert_eq!(json["pcid"], 1);
    assert_eq!(json["representation"], "dimensional");
    assert_eq!(json["npoints"], 9);
    assert_eq!(json["compressions"].as_array().unwrap().len(), 4);
    assert_eq!(json["bounds"]["xmax"], 8.0);
}
