//! Compression codec infrastructure for 7z archives.
//!
//! This module provides the abstraction layer for compression codecs
//! and integrates LZMA/LZMA2 support.

#[cfg(feature = "lzma")]
pub mod lzma;

#[cfg(feature = "lzma")]
pub mod filters;

pub mod bcj2;

mod copy;

use crate::{Error, Result};
#[allow(unused_imports)]
use std::io::{self, Cursor, Read};

#[allow(unused_imports)]
use crate::format::streams::{BindPair, Coder, Folder};

/// A decoder that reads compressed data and produces uncompressed output.
pub trait Decoder: Read + Send {
    /// Returns the method ID for this decoder.
    fn method_id(&self) -> &'static [u8];
}

/// Copy decoder (no compression).
pub use copy::CopyDecoder;

#[cfg(feature = "lzma")]
pub use lzma::{Lzma2Decoder, LzmaDecoder};

#[cfg(feature = "lzma")]
pub use filters::{
    BcjArm64Decoder, BcjArmDecoder, BcjArmThumbDecoder, BcjIa64Decoder, BcjPpcDecoder,
    BcjRiscvDecoder, BcjSparcDecoder, BcjX86Decoder, DeltaDecoder,
};

pub use bcj2::{Bcj2Decoder, Bcj2DecoderWrapper, RangeDecoder};

/// Method IDs for compression algorithms.
pub mod method {
    /// Copy (no compression).
    pub const COPY: &[u8] = &[0x00];
    /// LZMA compression.
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    /// LZMA2 compression.
    pub const LZMA2: &[u8] = &[0x21];
    /// Deflate compression.
    pub const DEFLATE: &[u8] = &[0x04, 0x01, 0x08];
    /// Deflate64 compression.
    pub const DEFLATE64: &[u8] = &[0x04, 0x01, 0x09];
    /// BZip2 compression.
    pub const BZIP2: &[u8] = &[0x04, 0x02, 0x02];
    /// PPMd compression.
    pub const PPMD: &[u8] = &[0x03, 0x04, 0x01];
    /// BCJ (x86) filter.
    pub const BCJ_X86: &[u8] = &[0x03, 0x03, 0x01, 0x03];
    /// BCJ (ARM) filter.
    pub const BCJ_ARM: &[u8] = &[0x03, 0x03, 0x05, 0x01];
    /// BCJ (ARM64/AArch64) filter.
    pub const BCJ_ARM64: &[u8] = &[0x03, 0x03, 0x06, 0x01];
    /// BCJ (ARM Thumb) filter.
    pub const BCJ_ARM_THUMB: &[u8] = &[0x03, 0x03, 0x07, 0x01];
    /// BCJ (PowerPC) filter.
    pub const BCJ_PPC: &[u8] = &[0x03, 0x03, 0x02, 0x05];
    /// BCJ (SPARC) filter.
    pub const BCJ_SPARC: &[u8] = &[0x03, 0x03, 0x08, 0x05];
    /// BCJ (IA64) filter.
    pub const BCJ_IA64: &[u8] = &[0x03, 0x03, 0x04, 0x01];
    /// BCJ (RISC-V) filter.
    pub const BCJ_RISCV: &[u8] = &[0x0B];
    /// BCJ2 (4-stream x86) filter.
    pub const BCJ2: &[u8] = &[0x03, 0x03, 0x01, 0x1B];
    /// Delta filter.
    pub const DELTA: &[u8] = &[0x03];
    /// AES-256 encryption.
    pub const AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

    /// Returns true if the method ID represents a filter (BCJ, Delta) rather than a codec.
    ///
    /// Filters are applied after decompression to reverse transformations like
    /// executable code preprocessing. They don't compress data themselves.
    pub fn is_filter(method_id: &[u8]) -> bool {
        matches!(
            method_id,
            BCJ_X86
                | BCJ_ARM
                | BCJ_ARM64
                | BCJ_ARM_THUMB
                | BCJ_PPC
                | BCJ_SPARC
                | BCJ_IA64
                | BCJ_RISCV
                | DELTA
        )
    }

    /// Returns a human-readable name for a method ID.
    pub fn name(id: &[u8]) -> &'static str {
        match id {
            COPY => "Copy",
            LZMA => "LZMA",
            LZMA2 => "LZMA2",
            DEFLATE => "Deflate",
            DEFLATE64 => "Deflate64",
            BZIP2 => "BZip2",
            PPMD => "PPMd",
            BCJ_X86 => "BCJ (x86)",
            BCJ_ARM => "BCJ (ARM)",
            BCJ_ARM64 => "BCJ (ARM64)",
            BCJ_ARM_THUMB => "BCJ (ARM Thumb)",
            BCJ_PPC => "BCJ (PowerPC)",
            BCJ_SPARC => "BCJ (SPARC)",
            BCJ_IA64 => "BCJ (IA64)",
            BCJ_RISCV => "BCJ (RISC-V)",
            BCJ2 => "BCJ2",
            DELTA => "Delta",
            AES => "AES-256",
            _ => "Unknown",
        }
    }
}

/// Builds a decoder for a given coder specification.
///
/// # Arguments
///
/// * `input` - The compressed data source
/// * `coder` - Coder specification from the archive header
/// * `uncompressed_size` - Expected size of uncompressed output
///
/// # Errors
///
/// Returns an error if the compression method is unsupported.
pub(crate) fn build_decoder<R: Read + Send + 'static>(
    input: R,
    coder: &Coder,
    uncompressed_size: u64,
) -> Result<Box<dyn Decoder>> {
    let method_id = &coder.method_id;
    #[allow(unused_variables)]
    let properties = coder.properties.as_deref().unwrap_or(&[]);

    match method_id.as_slice() {
        method::COPY => Ok(Box::new(CopyDecoder::new(input, uncompressed_size))),

        #[cfg(feature = "lzma")]
        method::LZMA => {
            let decoder = lzma::LzmaDecoder::new(input, properties, uncompressed_size)?;
            Ok(Box::new(decoder))
        }

        #[cfg(feature = "lzma")]
        method::LZMA2 => {
            let decoder = lzma::Lzma2Decoder::new(input, properties)?;
            Ok(Box::new(decoder))
        }

        // Recognized method IDs without a decoder implementation in this build.
        method::DEFLATE | method::DEFLATE64 | method::BZIP2 | method::PPMD => {
            Err(Error::UnsupportedMethod {
                method_id: coder.method_id_u64(),
            })
        }

        // BCJ filters
        #[cfg(feature = "lzma")]
        method::BCJ_X86 => Ok(Box::new(filters::BcjX86Decoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_ARM => Ok(Box::new(filters::BcjArmDecoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_ARM64 => Ok(Box::new(filters::BcjArm64Decoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_ARM_THUMB => Ok(Box::new(filters::BcjArmThumbDecoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_PPC => Ok(Box::new(filters::BcjPpcDecoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_SPARC => Ok(Box::new(filters::BcjSparcDecoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_IA64 => Ok(Box::new(filters::BcjIa64Decoder::new(input))),

        #[cfg(feature = "lzma")]
        method::BCJ_RISCV => Ok(Box::new(filters::BcjRiscvDecoder::new(input))),

        // Delta filter
        #[cfg(feature = "lzma")]
        method::DELTA => Ok(Box::new(filters::DeltaDecoder::new(input, properties))),

        // AES requires password - use build_decoder_encrypted instead
        #[cfg(feature = "aes")]
        method::AES => Err(Error::PasswordRequired),

        _ => {
            let method_id_u64 = coder.method_id_u64();
            Err(Error::UnsupportedMethod {
                method_id: method_id_u64,
            })
        }
    }
}

/// Builds a decoder chain for a folder, walking its bind-pair DAG in
/// topological (input-availability) order.
///
/// `packed_inputs` holds one reader per entry of `folder.packed_streams`, in
/// that order. For every coder input stream this first asks the folder's
/// bind pairs whether another coder produces it; if so that producer is
/// built first (recursively, so the whole chain resolves in dependency
/// order) and its output feeds the coder. Otherwise the input stream must be
/// one of the folder's packed streams, resolved via
/// [`Folder::find_packed_stream_index`] into `packed_inputs`. This covers
/// arbitrary coder graphs, not just the common linear `Delta -> LZMA2`
/// shape or single-packed-stream folders.
///
/// BCJ2's 4-input layout is detected by callers ([`Folder::uses_bcj2`])
/// before reaching this function and dispatched separately to
/// [`build_bcj2_folder_decoder`], which eagerly materializes all of its
/// inputs to `Vec<u8>`; coders with more than one input stream are
/// otherwise unsupported here since no other decoder in this build needs
/// it.
///
/// For encrypted folders, use [`build_encrypted_folder_decoder`] instead.
pub(crate) fn build_decoder_chain<R: Read + Send + 'static>(
    packed_inputs: Vec<R>,
    folder: &Folder,
    uncompressed_size: u64,
) -> Result<Box<dyn Read + Send>> {
    if folder.coders.is_empty() {
        return Err(Error::InvalidFormat("folder has no coders".into()));
    }

    if packed_inputs.len() != folder.packed_streams.len() {
        return Err(Error::InvalidFormat(format!(
            "folder expects {} packed stream(s), got {}",
            folder.packed_streams.len(),
            packed_inputs.len()
        )));
    }

    let main_idx = folder
        .main_coder_index()
        .ok_or_else(|| Error::InvalidFormat("folder has no main coder".into()))?;
    let offsets = folder.coder_stream_offsets();

    let mut pack_slots: Vec<Option<R>> = packed_inputs.into_iter().map(Some).collect();
    build_coder_output(folder, main_idx, &offsets, &mut pack_slots, uncompressed_size)
}

/// Recursively builds the decoder producing `coder_idx`'s output, pulling
/// its input either from another coder's output (via a bind pair) or from
/// one of the folder's packed streams.
fn build_coder_output<R: Read + Send + 'static>(
    folder: &Folder,
    coder_idx: usize,
    offsets: &[(usize, usize)],
    pack_slots: &mut [Option<R>],
    output_size: u64,
) -> Result<Box<dyn Read + Send>> {
    let coder = &folder.coders[coder_idx];

    if coder.num_in_streams != 1 {
        return Err(Error::UnsupportedFeature {
            feature: "multi-input coder outside BCJ2",
        });
    }

    let in_stream_idx = offsets[coder_idx].0 as u64;

    if let Some(bp) = folder.find_bind_pair_for_in_stream(in_stream_idx) {
        let (src_idx, _) = find_coder_for_output(folder, offsets, bp.out_index)?;
        let src_output_size = folder
            .unpack_sizes
            .get(src_idx)
            .copied()
            .unwrap_or(output_size);
        let source = build_coder_output(folder, src_idx, offsets, pack_slots, src_output_size)?;
        let decoder = build_decoder(source, coder, output_size)?;
        return Ok(decoder as Box<dyn Read + Send>);
    }

    let pack_idx = folder.find_packed_stream_index(in_stream_idx).ok_or_else(|| {
        Error::InvalidFormat(format!(
            "coder input stream {} has neither a bind pair nor a packed stream",
            in_stream_idx
        ))
    })?;
    let raw = pack_slots.get_mut(pack_idx).and_then(Option::take).ok_or_else(|| {
        Error::InvalidFormat("coder chain references the same packed stream more than once".into())
    })?;
    let decoder = build_decoder(raw, coder, output_size)?;
    Ok(decoder as Box<dyn Read + Send>)
}

/// Builds a decoder for an encrypted coder specification.
///
/// This function handles AES-encrypted codec chains. The password is used
/// to derive the decryption key.
///
/// # Arguments
///
/// * `input` - The encrypted data source
/// * `coder` - Coder specification from the archive header
/// * `uncompressed_size` - Expected size of uncompressed output
/// * `password` - Password for decryption
///
/// # Errors
///
/// Returns an error if decryption fails or the password is wrong.
#[cfg(feature = "aes")]
pub(crate) fn build_decoder_encrypted<R: Read + Send + 'static>(
    input: R,
    coder: &Coder,
    uncompressed_size: u64,
    password: &crate::crypto::Password,
) -> Result<Box<dyn Decoder>> {
    let method_id = &coder.method_id;
    let properties = coder.properties.as_deref().unwrap_or(&[]);

    if method_id.as_slice() == method::AES {
        // Create AES decoder
        let aes_decoder = crate::crypto::Aes256Decoder::new(input, properties, password)?;

        // Return as boxed decoder
        Ok(Box::new(AesDecoderWrapper { inner: aes_decoder }))
    } else {
        // Not AES - delegate to regular build_decoder
        build_decoder(input, coder, uncompressed_size)
    }
}

/// Wrapper to make Aes256Decoder implement the Decoder trait.
#[cfg(feature = "aes")]
struct AesDecoderWrapper<R: Read + Send> {
    inner: crate::crypto::Aes256Decoder<R>,
}

#[cfg(feature = "aes")]
impl<R: Read + Send> Read for AesDecoderWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(feature = "aes")]
impl<R: Read + Send> Decoder for AesDecoderWrapper<R> {
    fn method_id(&self) -> &'static [u8] {
        method::AES
    }
}

/// Builds a decoder chain for an encrypted folder.
///
/// This function handles folders where AES encryption is combined with compression.
/// It decrypts the data first, then applies the compression decoder.
///
/// # Arguments
///
/// * `input` - The encrypted packed data
/// * `folder` - The folder containing coder specifications
/// * `uncompressed_size` - Expected size of uncompressed output
/// * `password` - Password for decryption
///
/// # Returns
///
/// A boxed decoder that handles decryption and decompression.
///
/// # Early Password Validation
///
/// This function validates the password early by checking if the first
/// decrypted block looks like valid compression data. This avoids wasting
/// time decompressing garbage data when the password is wrong.
#[cfg(feature = "aes")]
pub(crate) fn build_encrypted_folder_decoder<R: Read + Send + 'static>(
    input: R,
    folder: &Folder,
    uncompressed_size: u64,
    password: &crate::crypto::Password,
) -> Result<Box<dyn Decoder>> {
    if folder.coders.is_empty() {
        return Err(Error::InvalidFormat("folder has no coders".into()));
    }

    // Find AES coder position
    let aes_coder_idx = folder
        .coders
        .iter()
        .position(|c| c.method_id.as_slice() == method::AES);

    match (folder.coders.len(), aes_coder_idx) {
        // Single AES coder - just decrypt (data is encrypted but not compressed)
        (1, Some(0)) => {
            let coder = &folder.coders[0];
            build_decoder_encrypted(input, coder, uncompressed_size, password)
        }

        // Two coders: AES (outer) + compression (inner)
        // Data flow: packed -> AES decrypt -> decompression -> output
        (2, Some(0)) => {
            let aes_coder = &folder.coders[0];
            let compression_coder = &folder.coders[1];
            let properties = aes_coder.properties.as_deref().unwrap_or(&[]);

            // Create AES decoder with early validation
            let mut aes_decoder = crate::crypto::Aes256Decoder::new(input, properties, password)?;

            // Get compression method for validation
            let compression_method = &compression_coder.method_id;

            // Perform early password validation
            if !aes_decoder.validate_first_block(compression_method)? {
                return Err(Error::WrongPassword {
                    entry_index: None,
                    entry_name: None,
                    detection_method: crate::error::PasswordDetectionMethod::EarlyHeaderValidation,
                });
            }

            // Get intermediate unpack size
            let intermediate_size = folder
                .unpack_sizes
                .first()
                .copied()
                .unwrap_or(uncompressed_size);

            // Now build the compression decoder on top of the AES decoder
            build_decoder(aes_decoder, compression_coder, intermediate_size)
        }

        // Two coders: compression (outer) + AES (inner) - less common order
        // Data flow: packed -> decompression -> AES decrypt -> output
        (2, Some(1)) => {
            let compression_coder = &folder.coders[0];
            let aes_coder = &folder.coders[1];

            // First decompress
            let intermediate_size = folder
                .unpack_sizes
                .first()
                .copied()
                .unwrap_or(uncompressed_size);
            let decompressed = build_decoder(input, compression_coder, intermediate_size)?;

            // Then decrypt
            build_decoder_encrypted(decompressed, aes_coder, uncompressed_size, password)
        }

        // Three coders: AES (outer) + filter + compression
        (3, Some(0)) => {
            let aes_coder = &folder.coders[0];
            let filter_coder = &folder.coders[1];
            let compression_coder = &folder.coders[2];
            let properties = aes_coder.properties.as_deref().unwrap_or(&[]);

            // Create AES decoder with early validation
            let mut aes_decoder = crate::crypto::Aes256Decoder::new(input, properties, password)?;

            // Validate against filter (or compression if filter doesn't have recognizable header)
            let validation_method = &compression_coder.method_id;
            if !aes_decoder.validate_first_block(validation_method)? {
                return Err(Error::WrongPassword {
                    entry_index: None,
                    entry_name: None,
                    detection_method: crate::error::PasswordDetectionMethod::EarlyHeaderValidation,
                });
            }

            // Build chain: AES -> compression -> filter
            let compression_size = folder
                .unpack_sizes
                .get(1)
                .copied()
                .unwrap_or(uncompressed_size);
            let decompressed = build_decoder(aes_decoder, compression_coder, compression_size)?;

            let filter_size = folder
                .unpack_sizes
                .first()
                .copied()
                .unwrap_or(uncompressed_size);
            build_decoder(decompressed, filter_coder, filter_size)
        }

        // No encryption - delegate to non-encrypted decoder
        (_, None) => {
            // This folder is not encrypted - use regular decoder chain
            Err(Error::InvalidFormat(
                "build_encrypted_folder_decoder called on non-encrypted folder".into(),
            ))
        }

        // Unsupported configuration
        _ => Err(Error::UnsupportedFeature {
            feature: "encrypted folder with unsupported coder arrangement",
        }),
    }
}

/// Validates a password against an encrypted folder without full decompression.
///
/// This function performs early password validation by decrypting the first
/// block and checking if it looks like valid compression data.
///
/// # Arguments
///
/// * `packed_data` - The encrypted packed data
/// * `folder` - The folder containing coder specifications
/// * `password` - Password to validate
///
/// # Returns
///
/// `true` if the password appears correct, `false` if definitely wrong.
/// Note: A return of `true` doesn't guarantee the password is correct,
/// only that the first block looks valid. CRC verification after full
/// decompression provides definitive confirmation.
#[cfg(feature = "aes")]
pub fn validate_encrypted_folder_password(
    packed_data: &[u8],
    folder: &Folder,
    password: &crate::crypto::Password,
) -> Result<bool> {
    // Find AES coder
    let aes_coder = folder
        .coders
        .iter()
        .find(|c| c.method_id.as_slice() == method::AES)
        .ok_or_else(|| Error::InvalidFormat("folder has no AES coder".into()))?;

    // Find compression coder (for header validation)
    let compression_coder = folder.coders.iter().find(|c| {
        matches!(
            c.method_id.as_slice(),
            method::LZMA | method::LZMA2 | method::DEFLATE | method::BZIP2 | method::PPMD
        )
    });

    let compression_method = compression_coder
        .map(|c| c.method_id.as_slice())
        .unwrap_or(&[]);
    let properties = aes_coder.properties.as_deref().unwrap_or(&[]);

    // Create AES decoder
    let cursor = std::io::Cursor::new(packed_data);
    let mut aes_decoder = crate::crypto::Aes256Decoder::new(cursor, properties, password)?;

    // Validate first block
    Ok(aes_decoder.validate_first_block(compression_method)?)
}

/// Builds a decoder for a BCJ2 folder.
///
/// BCJ2 is a 4-stream filter that requires special handling:
/// - Stream 0 (Main): Main code stream
/// - Stream 1 (Call): CALL destinations
/// - Stream 2 (Jump): JMP destinations
/// - Stream 3 (Range): Range-coded selector bits
///
/// Each BCJ2 input typically comes from an LZMA2 decoder fed by a packed stream.
///
/// # Arguments
///
/// * `folder` - The folder structure with coders and bind_pairs
/// * `packed_data` - The raw compressed data for each packed stream
///
/// # Returns
///
/// A boxed decoder that reads from BCJ2 and produces the final uncompressed output.
#[cfg(feature = "lzma")]
pub(crate) fn build_bcj2_folder_decoder(
    folder: &Folder,
    packed_data: &[Vec<u8>],
) -> Result<Box<dyn Decoder>> {
    // Find the BCJ2 coder
    let bcj2_coder_idx = folder
        .coders
        .iter()
        .position(|c| c.method_id.as_slice() == method::BCJ2)
        .ok_or_else(|| Error::InvalidFormat("No BCJ2 coder in folder".into()))?;

    let bcj2_coder = &folder.coders[bcj2_coder_idx];

    // BCJ2 must have exactly 4 inputs
    if bcj2_coder.num_in_streams != 4 {
        return Err(Error::InvalidFormat(format!(
            "BCJ2 expected 4 inputs, got {}",
            bcj2_coder.num_in_streams
        )));
    }

    // Get stream offsets for all coders
    let offsets = folder.coder_stream_offsets();
    let bcj2_first_in = offsets[bcj2_coder_idx].0 as u64;

    // Build readers for each of BCJ2's 4 inputs
    let mut bcj2_inputs: Vec<Vec<u8>> = Vec::with_capacity(4);

    for i in 0..4 {
        let in_stream_idx = bcj2_first_in + i;
        let input_data = resolve_input_stream(folder, &offsets, in_stream_idx, packed_data)?;
        bcj2_inputs.push(input_data);
    }

    // Create Bcj2Decoder with Cursor readers
    let main = Cursor::new(bcj2_inputs.remove(0));
    let call = Cursor::new(bcj2_inputs.remove(0));
    let jump = Cursor::new(bcj2_inputs.remove(0));
    let range = Cursor::new(bcj2_inputs.remove(0));

    let decoder = bcj2::Bcj2Decoder::new(main, call, jump, range)?;

    Ok(Box::new(bcj2::Bcj2DecoderWrapper::new(decoder)))
}

/// Resolves an input stream to its decompressed data.
///
/// An input stream either:
/// 1. Comes from a packed_stream (raw compressed data from archive)
/// 2. Comes from a bind_pair (output of another coder)
#[cfg(feature = "lzma")]
fn resolve_input_stream(
    folder: &Folder,
    offsets: &[(usize, usize)],
    in_stream_idx: u64,
    packed_data: &[Vec<u8>],
) -> Result<Vec<u8>> {
    // Check if this input comes from a packed stream
    if let Some(pack_idx) = folder.find_packed_stream_index(in_stream_idx) {
        if pack_idx >= packed_data.len() {
            return Err(Error::InvalidFormat(format!(
                "Pack index {} out of bounds (have {} streams)",
                pack_idx,
                packed_data.len()
            )));
        }

        // Find the coder that uses this input
        let (coder_idx, _local_in_idx) = find_coder_for_input(folder, offsets, in_stream_idx)?;
        let coder = &folder.coders[coder_idx];

        // If this input belongs to BCJ2 directly (not to a compression coder),
        // return the raw data without decoding. BCJ2's Call/Jump/Range streams
        // are often stored uncompressed in the archive.
        if coder.method_id.as_slice() == method::BCJ2 {
            return Ok(packed_data[pack_idx].clone());
        }

        // Get the unpack size for this coder
        let unpack_size = if coder_idx < folder.unpack_sizes.len() {
            folder.unpack_sizes[coder_idx]
        } else {
            // If no explicit unpack size, we don't know the size
            u64::MAX
        };

        // Build decoder for this coder and decompress
        let input = Cursor::new(packed_data[pack_idx].clone());
        let mut decoder = build_decoder(input, coder, unpack_size)?;

        let mut output = Vec::new();
        decoder.read_to_end(&mut output).map_err(Error::Io)?;

        return Ok(output);
    }

    // Check if this input comes from a bind_pair (another coder's output)
    if let Some(bp) = folder.find_bind_pair_for_in_stream(in_stream_idx) {
        // Find which coder produces this output
        let (src_coder_idx, _local_out_idx) = find_coder_for_output(folder, offsets, bp.out_index)?;

        // Find the source coder's input
        let src_coder = &folder.coders[src_coder_idx];
        let src_first_in = offsets[src_coder_idx].0 as u64;

        // For single-input coders, recursively resolve
        if src_coder.num_in_streams == 1 {
            let src_in_stream = src_first_in;
            return resolve_input_stream(folder, offsets, src_in_stream, packed_data);
        }

        // For multi-input coders (like BCJ2), this shouldn't happen in typical archives
        return Err(Error::UnsupportedFeature {
            feature: "nested multi-input coders",
        });
    }

    Err(Error::InvalidFormat(format!(
        "Input stream {} not found in packed_streams or bind_pairs",
        in_stream_idx
    )))
}

/// Finds the coder index and local input index for a given global input stream index.
#[cfg(feature = "lzma")]
fn find_coder_for_input(
    folder: &Folder,
    offsets: &[(usize, usize)],
    in_stream_idx: u64,
) -> Result<(usize, usize)> {
    for (coder_idx, coder) in folder.coders.iter().enumerate() {
        let first_in = offsets[coder_idx].0 as u64;
        let last_in = first_in + coder.num_in_streams;
        if in_stream_idx >= first_in && in_stream_idx < last_in {
            return Ok((coder_idx, (in_stream_idx - first_in) as usize));
        }
    }
    Err(Error::InvalidFormat(format!(
        "No coder found for input stream {}",
        in_stream_idx
    )))
}

/// Finds the coder index and local output index for a given global output stream index.
fn find_coder_for_output(
    folder: &Folder,
    offsets: &[(usize, usize)],
    out_stream_idx: u64,
) -> Result<(usize, usize)> {
    for (coder_idx, coder) in folder.coders.iter().enumerate() {
        let first_out = offsets[coder_idx].1 as u64;
        let last_out = first_out + coder.num_out_streams;
        if out_stream_idx >= first_out && out_stream_idx < last_out {
            return Ok((coder_idx, (out_stream_idx - first_out) as usize));
        }
    }
    Err(Error::InvalidFormat(format!(
        "No coder found for output stream {}",
        out_stream_idx
    )))
}

/// Codec method types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecMethod {
    /// No compression.
    Copy,
    /// LZMA compression.
    Lzma,
    /// LZMA2 compression.
    Lzma2,
    /// Deflate compression. Recognized but not decoded by this build.
    Deflate,
    /// Deflate64 compression. Recognized but not decoded by this build.
    Deflate64,
    /// BZip2 compression. Recognized but not decoded by this build.
    BZip2,
    /// PPMd compression. Recognized but not decoded by this build.
    PPMd,
}

impl CodecMethod {
    /// Creates a CodecMethod from a coder specification.
    pub fn from_coder(coder: &Coder) -> Result<Self> {
        match coder.method_id.as_slice() {
            method::COPY => Ok(Self::Copy),
            method::LZMA => Ok(Self::Lzma),
            method::LZMA2 => Ok(Self::Lzma2),
            method::DEFLATE => Ok(Self::Deflate),
            method::DEFLATE64 => Ok(Self::Deflate64),
            method::BZIP2 => Ok(Self::BZip2),
            method::PPMD => Ok(Self::PPMd),
            _ => Err(Error::UnsupportedMethod {
                method_id: coder.method_id_u64(),
            }),
        }
    }

    /// Returns whether this is a compression codec (vs. a filter).
    pub fn is_compression(&self) -> bool {
        true // All CodecMethod variants are compression codecs
    }

    /// Returns the method ID as a u64.
    pub fn method_id(&self) -> u64 {
        match self {
            Self::Copy => 0x00,
            Self::Lzma => 0x030101,
            Self::Lzma2 => 0x21,
            Self::Deflate => 0x040108,
            Self::Deflate64 => 0x040109,
            Self::BZip2 => 0x040202,
            Self::PPMd => 0x030401,
        }
    }

    /// Returns whether this codec can actually be decoded by this build.
    ///
    /// `Copy`, `Lzma`, and `Lzma2` are implemented; the other variants are
    /// recognized method IDs with no decoder behind them.
    ///
    /// # Examples
    ///
    /// ```
    /// use sevenz_core::codec::CodecMethod;
    ///
    /// // Copy is always available
    /// assert!(CodecMethod::Copy.is_available());
    ///
    /// // LZMA requires the "lzma" feature
    /// if CodecMethod::Lzma.is_available() {
    ///     println!("LZMA compression is available");
    /// }
    /// ```
    pub fn is_available(&self) -> bool {
        match self {
            Self::Copy => true,
            Self::Lzma | Self::Lzma2 => cfg!(feature = "lzma"),
            Self::Deflate | Self::Deflate64 | Self::BZip2 | Self::PPMd => false,
        }
    }

    /// Returns the feature flag name required for this codec, if any.
    ///
    /// Returns `None` for codecs that are always available (e.g., `Copy`).
    ///
    /// # Examples
    ///
    /// ```
    /// use sevenz_core::codec::CodecMethod;
    ///
    /// assert_eq!(CodecMethod::Copy.required_feature(), None);
    /// assert_eq!(CodecMethod::Lzma.required_feature(), Some("lzma"));
    /// ```
    pub fn required_feature(&self) -> Option<&'static str> {
        match self {
            Self::Copy => None,
            Self::Lzma | Self::Lzma2 => Some("lzma"),
            Self::Deflate | Self::Deflate64 | Self::BZip2 | Self::PPMd => None,
        }
    }
}

/// Filter method types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FilterMethod {
    /// BCJ (x86) filter.
    BcjX86,
    /// BCJ (ARM) filter.
    BcjArm,
    /// BCJ (ARM64) filter.
    BcjArm64,
    /// BCJ (ARM Thumb) filter.
    BcjArmThumb,
    /// BCJ (PowerPC) filter.
    BcjPpc,
    /// BCJ (SPARC) filter.
    BcjSparc,
    /// BCJ (IA64) filter.
    BcjIa64,
    /// BCJ (RISC-V) filter.
    BcjRiscv,
    /// Delta filter.
    Delta,
}

impl FilterMethod {
    /// Creates a FilterMethod from a coder specification.
    pub fn from_coder(coder: &Coder) -> Result<Self> {
        match coder.method_id.as_slice() {
            method::BCJ_X86 => Ok(Self::BcjX86),
            method::BCJ_ARM => Ok(Self::BcjArm),
            method::BCJ_ARM64 => Ok(Self::BcjArm64),
            method::BCJ_ARM_THUMB => Ok(Self::BcjArmThumb),
            method::BCJ_PPC => Ok(Self::BcjPpc),
            method::BCJ_SPARC => Ok(Self::BcjSparc),
            method::BCJ_IA64 => Ok(Self::BcjIa64),
            method::BCJ_RISCV => Ok(Self::BcjRiscv),
            method::DELTA => Ok(Self::Delta),
            _ => Err(Error::UnsupportedMethod {
                method_id: coder.method_id_u64(),
            }),
        }
    }
}

/// Represents a validated method chain.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum MethodChain {
    /// Single compression codec.
    Codec(CodecMethod),
    /// Filter followed by compression codec.
    FilterThenCodec {
        /// The filter method.
        filter: FilterMethod,
        /// The compression codec.
        codec: CodecMethod,
    },
}

impl MethodChain {
    /// Validates and constructs a method chain from coders.
    ///
    /// Supports:
    /// - Single codec (LZMA, LZMA2, Deflate, etc.)
    /// - BCJ/Delta filter followed by codec
    pub fn validate(coders: &[Coder]) -> Result<Self> {
        match coders.len() {
            0 => Err(Error::InvalidFormat("empty method chain".into())),

            1 => Ok(Self::Codec(CodecMethod::from_coder(&coders[0])?)),

            2 => {
                // First coder should be a filter, second should be compression
                let filter = FilterMethod::from_coder(&coders[0])?;
                let codec = CodecMethod::from_coder(&coders[1])?;

                Ok(Self::FilterThenCodec { filter, codec })
            }

            _ => Err(Error::UnsupportedFeature {
                feature: "complex method chains with more than 2 coders",
            }),
        }
    }
}
