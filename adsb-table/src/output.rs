//! Parquet output through `arrow2`.
//!
//! Writes parquet v2 with zstd compression. Absent values go into the Arrow
//! validity bitmap, so they read back as nulls rather than zeros.

use std::fs::File;
use std::path::Path;

use adsb_core::AircraftTable;
use anyhow::Result;
use arrow2::{
    array::{Array, Float64Array, Utf8Array},
    chunk::Chunk,
    datatypes::{DataType, Field, Schema},
    io::parquet::write::{
        transverse, CompressionOptions, FileWriter, RowGroupIterator, Version, WriteOptions,
    },
};
use parquet2::{compression::ZstdLevel, encoding::Encoding};
use tracing::info;

/// Arrow schema of the output table.
pub fn schema() -> Schema {
    Schema::from(vec![
        Field::new("timestamp", DataType::Float64, false),
        Field::new("aircraft", DataType::Utf8, false),
        Field::new("callsign", DataType::Utf8, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("altitude", DataType::Float64, true),
        Field::new("ground_speed", DataType::Float64, true),
        Field::new("air_speed", DataType::Float64, true),
        Field::new("heading", DataType::Float64, true),
        Field::new("vertical_rate", DataType::Float64, true),
    ])
}

/// Convert the table into one Arrow chunk, columns in schema order.
pub fn to_chunk(table: &AircraftTable) -> Result<Chunk<Box<dyn Array>>> {
    let mut arrays: Vec<Box<dyn Array>> = vec![
        Float64Array::from_slice(&table.timestamp).boxed(),
        Utf8Array::<i32>::from_slice(&table.aircraft).boxed(),
        Utf8Array::<i32>::from_iter(table.callsign.iter().map(|c| c.as_deref())).boxed(),
    ];
    for (_, column) in table.float_columns() {
        arrays.push(Float64Array::from(column).boxed());
    }
    Ok(Chunk::try_new(arrays)?)
}

/// Write `table` to `path`. Returns the file size in bytes.
///
/// An empty table still produces a valid file carrying the schema.
#[tracing::instrument(skip(table), fields(rows = table.len()))]
pub fn write_parquet(table: &AircraftTable, path: &Path, level: i32) -> Result<u64> {
    let options = WriteOptions {
        write_statistics: true,
        compression: CompressionOptions::Zstd(Some(ZstdLevel::try_new(level)?)),
        version: Version::V2,
        data_pagesize_limit: None,
    };

    let schema = schema();
    let chunks: Vec<arrow2::error::Result<_>> = if table.is_empty() {
        vec![]
    } else {
        vec![Ok(to_chunk(table)?)]
    };

    let encodings = schema
        .fields
        .iter()
        .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
        .collect();

    let file = File::create(path)?;
    let row_groups = RowGroupIterator::try_new(chunks.into_iter(), &schema, options, encodings)?;
    let mut writer = FileWriter::try_new(file, schema, options)?;

    for group in row_groups {
        writer.write(group?)?;
    }

    let size = writer.end(None)?;
    info!("{} bytes written to {}", size, path.display());
    Ok(size)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use adsb_core::OutputRow;
    use arrow2::io::parquet::read::{infer_schema, read_metadata, FileReader};

    use super::*;

    fn sample_table() -> AircraftTable {
        let rows = vec![
            OutputRow {
                timestamp: 100.5,
                aircraft: "40621d".into(),
                callsign: Some("KLM1023".into()),
                longitude: Some(3.93891),
                latitude: Some(52.26578),
                altitude: Some(0.0),
                ground_speed: None,
                air_speed: Some(375.0),
                heading: Some(243.98),
                vertical_rate: Some(-2304.0),
            },
            OutputRow {
                timestamp: 101.0,
                aircraft: "abcdef".into(),
                callsign: None,
                longitude: Some(1.0),
                latitude: Some(2.0),
                altitude: None,
                ground_speed: Some(0.0),
                air_speed: None,
                heading: None,
                vertical_rate: None,
            },
        ];
        AircraftTable::from_rows(&rows)
    }

    fn read_back(path: &Path) -> (Schema, Vec<Chunk<Box<dyn Array>>>) {
        let mut reader = File::open(path).unwrap();
        let metadata = read_metadata(&mut reader).unwrap();
        let schema = infer_schema(&metadata).unwrap();
        let chunks = FileReader::new(reader, metadata.row_groups, schema.clone(), None, None, None)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        (schema, chunks)
    }

    fn floats(chunk: &Chunk<Box<dyn Array>>, idx: usize) -> Vec<Option<f64>> {
        chunk.arrays()[idx]
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .iter()
            .map(|v| v.copied())
            .collect()
    }

    #[test]
    fn test_nulls_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let size = write_parquet(&sample_table(), &path, 8).unwrap();
        assert!(size > 0);

        let (schema, chunks) = read_back(&path);
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, adsb_core::table::COLUMNS);

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.len(), 2);

        // altitude: genuine zero vs absent
        assert_eq!(floats(chunk, 5), vec![Some(0.0), None]);
        // ground_speed
        assert_eq!(floats(chunk, 6), vec![None, Some(0.0)]);
        assert_eq!(floats(chunk, 0), vec![Some(100.5), Some(101.0)]);

        let callsign = chunk.arrays()[2]
            .as_any()
            .downcast_ref::<Utf8Array<i32>>()
            .unwrap();
        assert_eq!(callsign.value(0), "KLM1023");
        assert!(callsign.is_null(1));

        let aircraft = chunk.arrays()[1]
            .as_any()
            .downcast_ref::<Utf8Array<i32>>()
            .unwrap();
        assert_eq!(aircraft.value(1), "abcdef");
    }

    #[test]
    fn test_empty_table_writes_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        write_parquet(&AircraftTable::new(), &path, 8).unwrap();

        let (schema, chunks) = read_back(&path);
        assert_eq!(schema.fields.len(), 10);
        assert!(!schema.fields[0].is_nullable);
        assert!(schema.fields[2].is_nullable);
        assert!(chunks.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_invalid_compression_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        assert!(write_parquet(&sample_table(), &path, 99).is_err());
    }
}
