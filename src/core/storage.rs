// Binary image container: magic + version header, then tagged LZ4 chunks.
//
// Chunk framing: 4-byte tag, u32 compressed length, u32 uncompressed
// length, compressed payload. All integers little-endian. Readers skip
// chunks with unknown tags so the format can grow.

use std::io::{self, Read, Write};

pub(crate) const MAGIC: &[u8; 8] = b"DYNFLD01";
pub(crate) const VERSION: u32 = 1;

// Refuse absurd chunk sizes before allocating.
const MAX_CHUNK_LEN: u32 = 1 << 30;

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn take_bytes<'a>(data: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    if data.len() < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated payload",
        ));
    }
    let (head, tail) = data.split_at(n);
    *data = tail;
    Ok(head)
}

pub(crate) fn take_u32(data: &mut &[u8]) -> io::Result<u32> {
    let mut b = [0u8; 4];
    b.copy_from_slice(take_bytes(data, 4)?);
    Ok(u32::from_le_bytes(b))
}

pub(crate) fn take_u64(data: &mut &[u8]) -> io::Result<u64> {
    let mut b = [0u8; 8];
    b.copy_from_slice(take_bytes(data, 8)?);
    Ok(u64::from_le_bytes(b))
}

pub(crate) fn take_f64(data: &mut &[u8]) -> io::Result<f64> {
    let mut b = [0u8; 8];
    b.copy_from_slice(take_bytes(data, 8)?);
    Ok(f64::from_le_bytes(b))
}

pub(crate) fn write_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())
}

pub(crate) fn read_header<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad image magic"));
    }
    let mut v = [0u8; 4];
    r.read_exact(&mut v)?;
    let version = u32::from_le_bytes(v);
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported image version",
        ));
    }
    Ok(version)
}

pub(crate) fn write_chunk<W: Write>(w: &mut W, tag: &[u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = lz4_flex::block::compress(payload);
    w.write_all(tag)?;
    w.write_all(&(compressed.len() as u32).to_le_bytes())?;
    w.write_all(&(payload.len() as u32).to_le_bytes())?;
    w.write_all(&compressed)
}

/// Read the next chunk, `None` at a clean end of stream.
pub(crate) fn read_chunk<R: Read>(r: &mut R) -> io::Result<Option<([u8; 4], Vec<u8>)>> {
    let mut tag = [0u8; 4];
    let mut filled = 0;
    while filled < tag.len() {
        match r.read(&mut tag[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    if filled < tag.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated chunk tag",
        ));
    }

    let mut len = [0u8; 4];
    r.read_exact(&mut len)?;
    let compressed_len = u32::from_le_bytes(len);
    r.read_exact(&mut len)?;
    let uncompressed_len = u32::from_le_bytes(len);
    if compressed_len > MAX_CHUNK_LEN || uncompressed_len > MAX_CHUNK_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "chunk too large"));
    }

    let mut compressed = vec![0u8; compressed_len as usize];
    r.read_exact(&mut compressed)?;
    let payload = lz4_flex::block::decompress(&compressed, uncompressed_len as usize)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("lz4: {e}")))?;
    Ok(Some((tag, payload)))
}
