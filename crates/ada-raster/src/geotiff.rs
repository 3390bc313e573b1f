//! GeoTIFF decoding and encoding.
//!
//! Georeferencing is read from and written to the standard GeoTIFF tags:
//! - ModelPixelScale (33550) and ModelTiepoint (33922), with ModelTransformation
//!   (34264) as a fallback on read
//! - GeoKeyDirectory (34735) for the EPSG code of the coordinate system
//! - GDAL_NODATA (42113), an ASCII tag holding the nodata sentinel
//!
//! Pixel data is band-interleaved ("chunky"). 8-bit and 16-bit unsigned and
//! 32-bit float samples are kept as-is; every other sample type is widened to
//! 32-bit float. Gray, RGB and RGBA images are written; gray-alpha images are
//! also read.

use crate::{Crs, GeoTransform, Raster, RasterError, Result, Samples};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{
    self, Gray16, Gray32Float, Gray8, RGB16, RGB32Float, RGB8, RGBA16, RGBA32Float, RGBA8,
};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;

// GeoTIFF tag IDs
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Resolve a GeoTIFF tag code to the decoder's tag value, whether or not the
/// tiff crate names it.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read a GeoTIFF file into memory.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}

/// Decode a GeoTIFF from any seekable reader.
pub fn decode<R: Read + Seek>(reader: R) -> Result<Raster> {
    // Full-resolution imagery tiles are far above the default decoding limits.
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let bands = band_count(decoder.colortype()?)?;
    let geotransform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);
    let samples = decode_samples(&mut decoder)?;

    Ok(
        Raster::new(width as usize, height as usize, bands, samples, geotransform)?
            .with_crs(crs)
            .with_nodata(nodata),
    )
}

fn band_count(colortype: ColorType) -> Result<usize> {
    match colortype {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        other => Err(RasterError::UnsupportedLayout(format!(
            "color type {other:?}"
        ))),
    }
}

/// Read the geotransform from ModelTiepoint + ModelPixelScale, falling back to
/// ModelTransformation.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(GEOTIFF_MODELTIEPOINT));
    let pixel_scale = decoder.get_tag_f64_vec(geo_tag(GEOTIFF_MODELPIXELSCALE));

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z], pixel (i, j) sits at ground (x, y)
            let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
            let (scale_x, scale_y) = (scale[0], scale[1]);
            return Ok(GeoTransform::new(
                x - i * scale_x,
                y + j * scale_y,
                scale_x,
                -scale_y,
            ));
        }
    }

    if let Ok(m) = decoder.get_tag_f64_vec(geo_tag(GEOTIFF_MODELTRANSFORMATION)) {
        if m.len() >= 8 {
            if m[1] != 0.0 || m[4] != 0.0 {
                return Err(RasterError::UnsupportedLayout(
                    "rotated ModelTransformation".to_string(),
                ));
            }
            return Ok(GeoTransform::new(m[3], m[7], m[0], m[5]));
        }
    }

    Err(RasterError::InvalidGeoTiff(
        "missing ModelTiepoint/ModelPixelScale and ModelTransformation tags".to_string(),
    ))
}

/// Read the coordinate system from the GeoKey directory.
///
/// Keys stored out-of-line (TIFFTagLocation != 0) and user-defined systems are
/// ignored.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u16_vec(geo_tag(GEOTIFF_GEOKEYDIRECTORY))
        .ok()?;
    parse_geokeys(&keys)
}

fn parse_geokeys(keys: &[u16]) -> Option<Crs> {
    let header = keys.get(..4)?;
    let count = header[3] as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == USER_DEFINED {
            continue;
        }
        match id {
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(value),
            _ => {}
        }
    }

    projected
        .map(Crs::Projected)
        .or_else(|| geographic.map(Crs::Geographic))
}

/// Read the nodata sentinel from the GDAL_NODATA tag.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(geo_tag(GDAL_NODATA))
        .ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Samples> {
    let samples = match decoder.read_image()? {
        DecodingResult::U8(data) => Samples::U8(data),
        DecodingResult::U16(data) => Samples::U16(data),
        DecodingResult::F32(data) => Samples::F32(data),
        DecodingResult::F64(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Samples::F32(data.into_iter().map(|v| v as f32).collect()),
    };
    Ok(samples)
}

/// Write a raster to a GeoTIFF file.
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a raster as uncompressed GeoTIFF into any seekable writer.
///
/// Only layouts the decoder reads back are written: 1 band (gray), 3 bands
/// (RGB) or 4 bands (RGBA). Any other band count is an
/// [`RasterError::UnsupportedLayout`].
pub fn encode<W: Write + Seek>(raster: &Raster, writer: W) -> Result<()> {
    if raster.width() == 0 || raster.height() == 0 {
        return Err(RasterError::EmptyRaster {
            width: raster.width(),
            height: raster.height(),
        });
    }
    if !matches!(raster.bands(), 1 | 3 | 4) {
        return Err(RasterError::UnsupportedLayout(format!(
            "{} bands; only 1, 3 or 4 bands can be written",
            raster.bands()
        )));
    }

    let encoder = TiffEncoder::new(writer)?;
    match (raster.samples(), raster.bands()) {
        (Samples::U8(data), 1) => write_image::<Gray8, _>(encoder, raster, data),
        (Samples::U8(data), 3) => write_image::<RGB8, _>(encoder, raster, data),
        (Samples::U8(data), _) => write_image::<RGBA8, _>(encoder, raster, data),
        (Samples::U16(data), 1) => write_image::<Gray16, _>(encoder, raster, data),
        (Samples::U16(data), 3) => write_image::<RGB16, _>(encoder, raster, data),
        (Samples::U16(data), _) => write_image::<RGBA16, _>(encoder, raster, data),
        (Samples::F32(data), 1) => write_image::<Gray32Float, _>(encoder, raster, data),
        (Samples::F32(data), 3) => write_image::<RGB32Float, _>(encoder, raster, data),
        (Samples::F32(data), _) => write_image::<RGBA32Float, _>(encoder, raster, data),
    }
}

fn write_image<C, W>(mut encoder: TiffEncoder<W>, raster: &Raster, data: &[C::Inner]) -> Result<()>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut image = encoder.new_image::<C>(raster.width() as u32, raster.height() as u32)?;
    write_geotiff_tags(image.encoder(), raster)?;
    image.write_data(data)?;
    Ok(())
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &Raster,
) -> Result<()> {
    let gt = raster.geotransform();

    // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
    let pixel_scale = [gt.pixel_width, -gt.pixel_height, 0.0];
    dir.write_tag(geo_tag(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

    // ModelTiepoint: pixel (0, 0) at the grid origin
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(geo_tag(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

    if let Some(crs) = raster.crs() {
        let geokeys = build_geokey_directory(crs);
        dir.write_tag(geo_tag(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;
    }

    if let Some(nodata) = raster.nodata() {
        dir.write_tag(geo_tag(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    Ok(())
}

fn build_geokey_directory(crs: Crs) -> Vec<u16> {
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID, TIFFTagLocation, Count, Value_Offset, ...]
    let mut keys = vec![1, 1, 0, 3];

    let model_type = if crs.is_geographic() {
        MODEL_TYPE_GEOGRAPHIC
    } else {
        MODEL_TYPE_PROJECTED
    };
    keys.extend_from_slice(&[GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);

    let crs_key = if crs.is_geographic() {
        GEOGRAPHIC_TYPE_GEO_KEY
    } else {
        PROJECTED_CS_TYPE_GEO_KEY
    };
    keys.extend_from_slice(&[crs_key, 0, 1, crs.epsg()]);

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn encode_to_vec(raster: &Raster) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        encode(raster, &mut buffer).expect("encode");
        buffer.into_inner()
    }

    #[test]
    fn test_geokeys_roundtrip() {
        let keys = build_geokey_directory(Crs::Projected(32651));
        assert_eq!(parse_geokeys(&keys), Some(Crs::Projected(32651)));

        let keys = build_geokey_directory(Crs::Geographic(4326));
        assert_eq!(parse_geokeys(&keys), Some(Crs::Geographic(4326)));
    }

    #[test]
    fn test_geokeys_ignores_user_defined() {
        let keys = [1, 1, 0, 1, PROJECTED_CS_TYPE_GEO_KEY, 0, 1, USER_DEFINED];
        assert_eq!(parse_geokeys(&keys), None);
        assert_eq!(parse_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_rgb_tile_keeps_georeferencing() {
        let width = 5;
        let height = 3;
        let samples: Vec<u8> = (0..width * height * 3).map(|v| v as u8).collect();
        let raster = Raster::new(
            width,
            height,
            3,
            Samples::U8(samples),
            GeoTransform::new(121.25, 17.5, 0.000_5, -0.000_5),
        )
        .unwrap()
        .with_crs(Some(Crs::Geographic(4326)))
        .with_nodata(Some(0.0));

        let decoded = decode(Cursor::new(encode_to_vec(&raster))).expect("decode");

        assert_eq!(decoded.dimensions(), (width, height));
        assert_eq!(decoded.bands(), 3);
        assert_eq!(decoded.samples(), raster.samples());
        assert_eq!(decoded.crs(), Some(Crs::Geographic(4326)));
        assert_eq!(decoded.nodata(), Some(0.0));
        assert_relative_eq!(decoded.geotransform().origin_x, 121.25);
        assert_relative_eq!(decoded.geotransform().origin_y, 17.5);
        assert_relative_eq!(decoded.geotransform().pixel_height, -0.000_5);
    }

    #[test]
    fn test_float_tile_without_crs() {
        let raster = Raster::new(
            2,
            2,
            1,
            Samples::F32(vec![0.5, -1.0, 2.25, 8.0]),
            GeoTransform::new(500_000.0, 1_900_000.0, 0.3, -0.3),
        )
        .unwrap();

        let decoded = decode(Cursor::new(encode_to_vec(&raster))).expect("decode");
        assert_eq!(decoded.samples(), raster.samples());
        assert_eq!(decoded.crs(), None);
        assert_eq!(decoded.nodata(), None);
    }

    #[test]
    fn test_encode_rejects_empty_raster() {
        let raster = Raster::new(
            0,
            4,
            1,
            Samples::U8(Vec::new()),
            GeoTransform::new(0.0, 0.0, 1.0, -1.0),
        )
        .unwrap();
        let mut buffer = Cursor::new(Vec::new());
        assert!(matches!(
            encode(&raster, &mut buffer),
            Err(RasterError::EmptyRaster { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_unreadable_band_counts() {
        for bands in [2, 5] {
            let raster = Raster::new(
                2,
                2,
                bands,
                Samples::U8(vec![1; 4 * bands]),
                GeoTransform::new(0.0, 0.0, 1.0, -1.0),
            )
            .unwrap();
            let mut buffer = Cursor::new(Vec::new());
            assert!(matches!(
                encode(&raster, &mut buffer),
                Err(RasterError::UnsupportedLayout(_))
            ));
            assert!(buffer.into_inner().is_empty());
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(Cursor::new(b"not a tiff".to_vec())).is_err());
    }
}
