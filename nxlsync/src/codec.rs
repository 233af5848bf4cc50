//! zlib helpers shared by the manifest decoder and the chunk pipeline.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Inflate a zlib stream, replacing the contents of `out`.
pub fn decompress_into(data: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    ZlibDecoder::new(data).read_to_end(out)?;
    Ok(())
}

/// Inflate a zlib stream into a fresh buffer.
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress_into(data, &mut out)?;
    Ok(out)
}

/// Deflate `data` into a zlib stream using stored (level 0) blocks.
///
/// Level 0 reproduces the form in which some single-chunk files are kept on
/// disk, so hashing this output can recognise them.
pub fn compress_stored(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() + 64);
    compress_stored_into(data, &mut out)?;
    Ok(out)
}

/// Like [`compress_stored`], replacing the contents of `out`.
pub fn compress_stored_into(data: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    let mut encoder = ZlibEncoder::new(out, Compression::none());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(())
}

/// Deflate `data` into a zlib stream at the given level.
pub fn compress(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() + 64), level);
    encoder.write_all(data)?;
    encoder.finish()
}
