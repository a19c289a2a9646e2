//! Content hashing helpers shared by every chunker kind.

use sha2::Digest;
use sha2::Sha256;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

pub fn sha256_hex_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}
