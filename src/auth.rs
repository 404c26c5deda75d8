// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! VNC authentication schemes.
//!
//! This module implements the client side of the RFB security handshake:
//! the None scheme (RFC 6143 Section 7.2.1), which exchanges nothing, and
//! VNC Authentication (Section 7.2.2), a DES challenge-response with a
//! VNC-specific bit reversal quirk applied to the password key.
//!
//! # Security Note
//!
//! VNC Authentication is a legacy protocol and has known security
//! limitations. It should only be used on trusted networks or in conjunction
//! with TLS/SSL tunneling.

use async_trait::async_trait;
use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, VncError};
use crate::protocol::{SECURITY_TYPE_NONE, SECURITY_TYPE_VNC_AUTH};
use crate::wire::{self, StreamReader, StreamWriter};

/// A client-side authentication scheme.
///
/// The handshake phase picks the first configured scheme whose type appears
/// in the server's security-type list and runs its `handshake`. Custom
/// schemes can be supplied through the connection configuration.
#[async_trait]
pub trait ClientAuth: Send + Sync {
    /// The security-type code this scheme negotiates as (RFC 6143 Table 1).
    fn security_type(&self) -> u8;

    /// Performs the scheme-specific part of the security handshake.
    ///
    /// Called after the security type has been agreed with the server; the
    /// security result (where the protocol version requires one) is read by
    /// the session afterwards.
    async fn handshake(
        &self,
        reader: &mut StreamReader<'_>,
        writer: &mut StreamWriter<'_>,
    ) -> Result<()>;
}

/// The "None" authentication scheme.
///
/// Exchanges nothing; the connection proceeds directly to the security
/// result (protocol 3.8) or initialization (3.3/3.7).
#[derive(Debug, Default)]
pub struct NoneAuth;

#[async_trait]
impl ClientAuth for NoneAuth {
    fn security_type(&self) -> u8 {
        SECURITY_TYPE_NONE
    }

    async fn handshake(&self, _reader: &mut StreamReader<'_>, _writer: &mut StreamWriter<'_>) -> Result<()> {
        Ok(())
    }
}

/// VNC Authentication: DES-encrypted challenge-response.
///
/// Reads the server's 16-byte challenge, encrypts it with the password-derived
/// DES key and writes the 16-byte response back.
#[derive(Debug)]
pub struct VncAuth {
    /// The VNC password. Only the first 8 bytes participate in the key.
    password: String,
}

impl VncAuth {
    /// Creates a new `VncAuth` instance.
    ///
    /// # Arguments
    ///
    /// * `password` - The VNC password to authenticate with.
    ///
    /// # Returns
    ///
    /// A new `VncAuth` object.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl ClientAuth for VncAuth {
    fn security_type(&self) -> u8 {
        SECURITY_TYPE_VNC_AUTH
    }

    async fn handshake(&self, reader: &mut StreamReader<'_>, writer: &mut StreamWriter<'_>) -> Result<()> {
        let challenge = wire::read_exact_vec(reader, 16).await?;
        let mut block = [0u8; 16];
        block.copy_from_slice(&challenge);

        let response = encrypt_challenge(&block, &self.password)?;
        writer.write_all(&response).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Encrypts a 16-byte challenge with the VNC password using DES.
///
/// Implements the VNC-specific DES encryption: the password is truncated or
/// zero-padded to 8 bytes, each key byte has its bits reversed, and the
/// challenge is encrypted as two independent 8-byte blocks (ECB mode).
///
/// # Arguments
///
/// * `challenge` - The 16-byte challenge received from the server.
/// * `password` - The VNC password string.
///
/// # Returns
///
/// The 16-byte encrypted response.
///
/// # Errors
///
/// Returns [`VncError::InvalidKey`] if the DES cipher rejects the key, which
/// cannot happen for an 8-byte key.
pub(crate) fn encrypt_challenge(challenge: &[u8; 16], password: &str) -> Result<[u8; 16]> {
    let cipher = Des::new_from_slice(&prepare_key(password)).map_err(|_| VncError::InvalidKey)?;

    let mut response = [0u8; 16];

    let mut block1_bytes = [0u8; 8];
    block1_bytes.copy_from_slice(&challenge[0..8]);
    let mut block1 = block1_bytes.into();
    cipher.encrypt_block(&mut block1);
    response[0..8].copy_from_slice(&block1);

    let mut block2_bytes = [0u8; 8];
    block2_bytes.copy_from_slice(&challenge[8..16]);
    let mut block2 = block2_bytes.into();
    cipher.encrypt_block(&mut block2);
    response[8..16].copy_from_slice(&block2);

    Ok(response)
}

/// Derives the 8-byte DES key from a VNC password.
///
/// The password's bytes are truncated or zero-padded to 8 bytes and every
/// byte has its bits reversed, a non-RFC but universal behavior of VNC
/// clients and servers.
fn prepare_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (i, &byte) in password.as_bytes().iter().take(8).enumerate() {
        key[i] = reverse_bits(byte);
    }
    key
}

/// Reverses the bits within a single byte.
///
/// # Arguments
///
/// * `byte` - The `u8` value whose bits are to be reversed.
///
/// # Returns
///
/// The `u8` value with its bits reversed.
///
/// # Example
///
/// `0b10110001` (177) becomes `0b10001101` (141).
fn reverse_bits(byte: u8) -> u8 {
    let mut result = 0u8;
    for i in 0..8 {
        if byte & (1 << i) != 0 {
            result |= 1 << (7 - i);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use des::cipher::BlockDecrypt;

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b1011_0001), 0b1000_1101);
        assert_eq!(reverse_bits(0x00), 0x00);
        assert_eq!(reverse_bits(0xFF), 0xFF);
        assert_eq!(reverse_bits(0x01), 0x80);
    }

    #[test]
    fn test_key_preparation() {
        // "password" bit-reversed byte by byte
        assert_eq!(
            prepare_key("password"),
            [0x0E, 0x86, 0xCE, 0xCE, 0xEE, 0xF6, 0x4E, 0x26]
        );
        // short passwords are zero-padded, long ones truncated
        assert_eq!(prepare_key("ab"), [0x86, 0x46, 0, 0, 0, 0, 0, 0]);
        assert_eq!(prepare_key("abcdefghij"), prepare_key("abcdefgh"));
    }

    #[test]
    fn test_canonical_challenge_response() {
        let challenge: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ];
        let response = encrypt_challenge(&challenge, "password").unwrap();

        // deterministic: the same inputs always produce the same ciphertext
        assert_eq!(
            response,
            encrypt_challenge(&challenge, "password").unwrap()
        );
        assert_ne!(&response[..], &challenge[..]);
        // the two halves are independent ECB blocks over distinct plaintext
        assert_ne!(&response[0..8], &response[8..16]);

        // decrypting with the same bit-reversed key recovers the challenge
        let cipher = Des::new_from_slice(&prepare_key("password")).unwrap();
        let mut block1_bytes = [0u8; 8];
        block1_bytes.copy_from_slice(&response[0..8]);
        let mut block1 = block1_bytes.into();
        cipher.decrypt_block(&mut block1);
        assert_eq!(&block1[..], &challenge[0..8]);

        let mut block2_bytes = [0u8; 8];
        block2_bytes.copy_from_slice(&response[8..16]);
        let mut block2 = block2_bytes.into();
        cipher.decrypt_block(&mut block2);
        assert_eq!(&block2[..], &challenge[8..16]);
    }

    #[tokio::test]
    async fn test_vnc_auth_handshake_writes_response() {
        let challenge: [u8; 16] = *b"0123456789abcdef";
        let mut reader: &[u8] = &challenge;
        let mut written = Vec::new();

        let auth = VncAuth::new("secret");
        auth.handshake(&mut reader, &mut written).await.unwrap();

        assert_eq!(
            written,
            encrypt_challenge(&challenge, "secret").unwrap().to_vec()
        );
    }

    #[test]
    fn test_security_types() {
        assert_eq!(NoneAuth.security_type(), SECURITY_TYPE_NONE);
        assert_eq!(VncAuth::new("x").security_type(), SECURITY_TYPE_VNC_AUTH);
    }
}
