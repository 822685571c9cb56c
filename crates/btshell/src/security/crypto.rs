//! Cryptographic functions for private address resolution
//!
//! Implements the security function `e` and the random address hash `ah`
//! (BT Core Spec Vol 3, Part H, 2.2). Keys and addresses are held least
//! significant octet first, as they arrive from the controller.

use crate::gap::{BdAddr, RESOLVABLE_PRIVATE_ADDRESS_BITS};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::RngCore;

/// Security function e: AES-128 with little-endian key and block
pub fn e(key: &[u8; 16], plaintext: &[u8; 16]) -> [u8; 16] {
    let mut key_be = *key;
    key_be.reverse();
    let mut block = *plaintext;
    block.reverse();

    let cipher = Aes128::new(GenericArray::from_slice(&key_be));
    let mut block = GenericArray::clone_from_slice(&block);
    cipher.encrypt_block(&mut block);

    let mut output = [0u8; 16];
    output.copy_from_slice(&block);
    output.reverse();
    output
}

/// Random address hash function ah (BT Core Spec Vol 3, Part H, 2.2.2)
pub fn ah(irk: &[u8; 16], prand: &[u8; 3]) -> [u8; 3] {
    // r' = padding || r
    let mut r_prime = [0u8; 16];
    r_prime[..3].copy_from_slice(prand);

    let hashed = e(irk, &r_prime);
    [hashed[0], hashed[1], hashed[2]]
}

/// Whether `address` was generated from `irk`
pub fn resolve_private_address(irk: &[u8; 16], address: &BdAddr) -> bool {
    let b = &address.bytes;
    ah(irk, &[b[3], b[4], b[5]]) == [b[0], b[1], b[2]]
}

/// Generate a fresh resolvable private address for `irk`
pub fn generate_resolvable_address(irk: &[u8; 16]) -> BdAddr {
    let mut prand = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut prand);
    prand[2] = (prand[2] & 0x3F) | RESOLVABLE_PRIVATE_ADDRESS_BITS;

    let hash = ah(irk, &prand);
    BdAddr::new([hash[0], hash[1], hash[2], prand[0], prand[1], prand[2]])
}

/// Generate a 128-bit random key
pub fn generate_random_128() -> [u8; 16] {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
