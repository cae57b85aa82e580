//! Authentication token derivation.
//!
//! Printer firmware validates a token derived from the user's password:
//! DES in ECB mode under a fixed key, PKCS#7 padded, base64 encoded. The
//! output must match the firmware bit for bit, so the scheme is reproduced
//! exactly as the device expects it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use des::Des;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::generic_array::GenericArray;
use ecb::cipher::{BlockEncryptMut, KeyInit};

type DesEcbEnc = ecb::Encryptor<Des>;

/// Fixed key baked into the firmware (`0x6138356539643638`).
const TOKEN_KEY: [u8; 8] = *b"a85e9d68";

/// Derive the device token for `password`.
///
/// Deterministic and infallible; an empty password yields the token the
/// firmware expects when no password is configured.
pub fn generate_token(password: &str) -> String {
    let ciphertext = DesEcbEnc::new(&GenericArray::from(TOKEN_KEY))
        .encrypt_padded_vec_mut::<Pkcs7>(password.as_bytes());
    STANDARD.encode(ciphertext)
}
