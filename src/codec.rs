/// Tick record encoder and decoder
///
/// Encoding writes every field at its fixed offset in host byte order.
/// Decoding accepts any buffer at least one record long and ignores
/// trailing bytes, so a datagram carrying extra payload still decodes.

use crate::protocol::*;
use byteorder::{ByteOrder, NativeEndian};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("invalid side byte: {0:#04x}")]
    InvalidSide(u8),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Encode a message into a fresh wire record
pub fn encode(msg: &MarketMessage) -> [u8; MESSAGE_SIZE] {
    let mut buf = [0u8; MESSAGE_SIZE];
    encode_into(msg, &mut buf);
    buf
}

/// Encode a message into an existing wire record
pub fn encode_into(msg: &MarketMessage, buf: &mut [u8; MESSAGE_SIZE]) {
    NativeEndian::write_u64(&mut buf[TIMESTAMP_OFFSET..INSTRUMENT_ID_OFFSET], msg.timestamp_us);
    NativeEndian::write_u32(&mut buf[INSTRUMENT_ID_OFFSET..PRICE_OFFSET], msg.instrument_id);
    NativeEndian::write_f64(&mut buf[PRICE_OFFSET..VOLUME_OFFSET], msg.price);
    NativeEndian::write_u64(&mut buf[VOLUME_OFFSET..SIDE_OFFSET], msg.volume);
    buf[SIDE_OFFSET] = msg.side.as_byte();
    NativeEndian::write_u32(&mut buf[SEQUENCE_OFFSET..MESSAGE_SIZE], msg.sequence);
}

pub struct Decoder;

impl Decoder {
    /// Decode the record at the start of `buffer`
    pub fn decode(buffer: &[u8]) -> DecodeResult<MarketMessage> {
        if buffer.len() < MESSAGE_SIZE {
            return Err(DecodeError::BufferTooSmall {
                need: MESSAGE_SIZE,
                have: buffer.len(),
            });
        }

        let side_byte = buffer[SIDE_OFFSET];
        let side = Side::from_byte(side_byte).ok_or(DecodeError::InvalidSide(side_byte))?;

        Ok(MarketMessage {
            timestamp_us: NativeEndian::read_u64(&buffer[TIMESTAMP_OFFSET..INSTRUMENT_ID_OFFSET]),
            instrument_id: NativeEndian::read_u32(&buffer[INSTRUMENT_ID_OFFSET..PRICE_OFFSET]),
            price: NativeEndian::read_f64(&buffer[PRICE_OFFSET..VOLUME_OFFSET]),
            volume: NativeEndian::read_u64(&buffer[VOLUME_OFFSET..SIDE_OFFSET]),
            side,
            sequence: NativeEndian::read_u32(&buffer[SEQUENCE_OFFSET..MESSAGE_SIZE]),
        })
    }

    /// Decode back-to-back records, calling `callback` for each one.
    /// Stops at the first incomplete record or when the callback returns false.
    pub fn decode_stream<F>(buffer: &[u8], mut callback: F) -> DecodeResult<usize>
    where
        F: FnMut(&MarketMessage) -> bool,
    {
        let mut count = 0;

        for chunk in buffer.chunks_exact(MESSAGE_SIZE) {
            let msg = Self::decode(chunk)?;
            count += 1;
            if !callback(&msg) {
                break;
            }
        }

        Ok(count)
    }
}
