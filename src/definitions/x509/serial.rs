//! Certificate serial numbers: positive, 63 to 160 bits, at most 20 octets.
use rand::{rngs::OsRng, RngCore};
use x509_cert::serial_number::SerialNumber;

use super::{Error, ProfileViolation};

pub const MIN_SERIAL_BITS: usize = 63;
pub const MAX_SERIAL_BITS: usize = 160;
pub const MAX_SERIAL_OCTETS: usize = 20;

/// 20 random octets with the top bit cleared and the next one set: always 159 bits.
pub fn generate() -> Result<SerialNumber, Error> {
    let mut bytes = [0u8; MAX_SERIAL_OCTETS];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    bytes[0] |= 0x40;
    SerialNumber::new(&bytes).map_err(Error::Encoding)
}

/// Check the magnitude of a DER serial number (without any sign octet).
pub fn validate(serial: &SerialNumber) -> Result<(), ProfileViolation> {
    let bytes = serial.as_bytes();
    if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        return Err(ProfileViolation::NegativeSerialNumber);
    }
    let magnitude = match bytes.iter().position(|b| *b != 0) {
        Some(start) => &bytes[start..],
        None => &[][..],
    };
    let bits = bit_length(magnitude);
    if (MIN_SERIAL_BITS..=MAX_SERIAL_BITS).contains(&bits) && magnitude.len() <= MAX_SERIAL_OCTETS
    {
        Ok(())
    } else {
        Err(ProfileViolation::SerialNumber {
            bits,
            octets: magnitude.len(),
        })
    }
}

fn bit_length(magnitude: &[u8]) -> usize {
    match magnitude.first() {
        Some(first) => (magnitude.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    }
}
