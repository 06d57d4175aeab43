use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::SerdeFormat;

#[derive(Debug, thiserror::Error)]
pub enum SerdeError {
    #[error("Payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("YAML serialization failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
    #[error("Binary encoding failed")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Binary decoding failed")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("LZ4 decompression failed")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("Binary payload has {0} trailing bytes")]
    TrailingBytes(usize),
}

pub type SerdeResult<T> = Result<T, SerdeError>;

pub fn serialize<T: Serialize>(value: &T, format: SerdeFormat) -> SerdeResult<Vec<u8>> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::to_string(value)?.into_bytes()),
        SerdeFormat::Json => Ok(serde_json::to_string_pretty(value)?.into_bytes()),
        SerdeFormat::Bin => {
            let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
            Ok(lz4_flex::compress_prepend_size(&encoded))
        }
    }
}

pub fn deserialize<T: DeserializeOwned + 'static>(
    serialized: &[u8],
    format: SerdeFormat,
) -> SerdeResult<T> {
    match format {
        SerdeFormat::Yaml => {
            let text = std::str::from_utf8(serialized)?;
            Ok(serde_yml::from_str(text)?)
        }
        SerdeFormat::Json => {
            let text = std::str::from_utf8(serialized)?;
            Ok(serde_json::from_str(text)?)
        }
        SerdeFormat::Bin => {
            let decompressed = lz4_flex::decompress_size_prepended(serialized)?;
            let (decoded, read) =
                bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())?;
            if read != decompressed.len() {
                return Err(SerdeError::TrailingBytes(decompressed.len() - read));
            }
            Ok(decoded)
        }
    }
}
