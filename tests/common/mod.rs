//! Shared fixture builders: raw dBase structures and a minimal implode
//! encoder (plain literal tokens only), assembled into DBC containers.

/// Emits implode streams bit by bit, least significant bit first.
struct BitWriter {
    bytes: Vec<u8>,
    bit_buffer: u32,
    bit_count: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    fn push_bits(&mut self, value: u32, count: u32) {
        self.bit_buffer |= value << self.bit_count;
        self.bit_count += count;
        while self.bit_count >= 8 {
            self.bytes.push((self.bit_buffer & 0xFF) as u8);
            self.bit_buffer >>= 8;
            self.bit_count -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push((self.bit_buffer & 0xFF) as u8);
        }
        self.bytes
    }
}

/// Compresses `data` as an implode stream of uncoded literal tokens followed
/// by the end-of-stream token (length symbol 15 with all extra bits set).
pub fn implode_stored(data: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    writer.push_bits(0, 8);
    writer.push_bits(4, 8);
    for &byte in data {
        writer.push_bits(0, 1);
        writer.push_bits(u32::from(byte), 8);
    }
    // Length symbol 15 has the canonical 7-bit code 0x7F, stored inverted.
    writer.push_bits(1, 1);
    writer.push_bits(0, 7);
    writer.push_bits(255, 8);
    writer.finish()
}

/// 32-byte dBase III table header.
pub fn raw_header(record_count: u32, header_length: u16, record_length: u16, language: u8) -> [u8; 32] {
    let mut header = [0_u8; 32];
    header[0] = 0x03;
    header[1..4].copy_from_slice(&[24, 1, 15]);
    header[4..8].copy_from_slice(&record_count.to_le_bytes());
    header[8..10].copy_from_slice(&header_length.to_le_bytes());
    header[10..12].copy_from_slice(&record_length.to_le_bytes());
    header[29] = language;
    header
}

/// 32-byte field descriptor.
pub fn raw_descriptor(name: &str, tag: u8, length: u8, decimals: u8) -> [u8; 32] {
    assert!(name.len() <= 11);
    let mut descriptor = [0_u8; 32];
    descriptor[..name.len()].copy_from_slice(name.as_bytes());
    descriptor[11] = tag;
    descriptor[16] = length;
    descriptor[17] = decimals;
    descriptor
}

/// Assembles a decompressed table buffer: header, catalog, terminator,
/// records, end-of-file marker.
pub fn table_buffer(descriptors: &[[u8; 32]], records: &[&[u8]], language: u8) -> Vec<u8> {
    let header_length = u16::try_from(32 + descriptors.len() * 32 + 1).unwrap();
    let record_length = u16::try_from(records.first().map_or(1, |r| r.len())).unwrap();

    let mut buffer = Vec::new();
    buffer.extend_from_slice(&raw_header(
        u32::try_from(records.len()).unwrap(),
        header_length,
        record_length,
        language,
    ));
    for descriptor in descriptors {
        buffer.extend_from_slice(descriptor);
    }
    buffer.push(0x0D);
    for record in records {
        assert_eq!(record.len(), usize::from(record_length));
        buffer.extend_from_slice(record);
    }
    buffer.push(0x1A);
    buffer
}

/// Wraps a decompressed table buffer in a DBC container: the pre-header is
/// copied verbatim, followed by a four-byte CRC slot and the implode stream
/// of the record region.
pub fn dbc_container(buffer: &[u8], header_length: usize) -> Vec<u8> {
    let mut container = buffer[..header_length].to_vec();
    container.extend_from_slice(&[0_u8; 4]);
    container.extend_from_slice(&implode_stored(&buffer[header_length..]));
    container
}
